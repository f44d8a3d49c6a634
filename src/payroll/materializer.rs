use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::PayrollError;
use crate::model::money::Money;
use crate::model::record::{ComputedFigures, RecordInput, RecordSnapshot};
use crate::payroll::aggregate;
use crate::payroll::gross::{GrossPay, gross_for_record};
use crate::payroll::period::resolve_period;
use crate::payroll::tax_client::{BatchCalcRequest, EmployeeCalcRequest, TaxEngine};
use crate::utils::holiday_cache::HolidayCache;

/// Submitted hours for one hourly employee. Salaried employees need no
/// entry.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmployeeHoursInput {
    pub employee_id: i64,
    #[schema(value_type = f64, example = 80.0)]
    pub regular_hours: Decimal,
    #[schema(value_type = f64, example = 4.5)]
    pub overtime_hours: Option<Decimal>,
}

#[derive(Debug, Clone, Copy)]
pub struct MaterializedRun {
    pub created: bool,
    pub run_id: i64,
}

/// Year-to-date statutory figures carried into a calculation request.
#[derive(Debug, Clone, Copy, Default)]
pub struct YtdFigures {
    pub gross: Money,
    pub cpp_base: Money,
    pub cpp_additional: Money,
    pub ei: Money,
}

/// Latest approved figures for the employee in the calendar year of
/// `period_end`, or zeros for a first run.
pub(crate) async fn ytd_for_employee(
    pool: &SqlitePool,
    company_id: i64,
    employee_id: i64,
    period_end: NaiveDate,
) -> Result<YtdFigures, PayrollError> {
    let year_start = NaiveDate::from_ymd_opt(period_end.year(), 1, 1).unwrap_or(period_end);

    let row = sqlx::query_as::<_, (Money, Money, Money, Money)>(
        r#"
        SELECT r.new_ytd_gross, r.new_ytd_cpp_base, r.new_ytd_cpp_additional, r.new_ytd_ei
        FROM payroll_records r
        JOIN payroll_runs p ON p.id = r.payroll_run_id
        WHERE p.company_id = ? AND r.employee_id = ?
          AND p.status = 'approved'
          AND p.period_end >= ? AND p.period_end < ?
        ORDER BY p.period_end DESC
        LIMIT 1
        "#,
    )
    .bind(company_id)
    .bind(employee_id)
    .bind(year_start)
    .bind(period_end)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some((gross, cpp_base, cpp_additional, ei)) => YtdFigures {
            gross,
            cpp_base,
            cpp_additional,
            ei,
        },
        None => YtdFigures::default(),
    })
}

pub(crate) fn calc_request_line(
    employee_id: i64,
    snapshot: &RecordSnapshot,
    gross: GrossPay,
    ytd: YtdFigures,
) -> EmployeeCalcRequest {
    EmployeeCalcRequest {
        employee_id,
        province: snapshot.province,
        pay_frequency: snapshot.pay_frequency,
        gross_regular: gross.regular,
        gross_overtime: gross.overtime,
        gross_holiday: gross.holiday,
        federal_claim_amount: snapshot.federal_claim_amount,
        provincial_claim_amount: snapshot.provincial_claim_amount,
        ytd_gross: ytd.gross,
        ytd_cpp_base: ytd.cpp_base,
        ytd_cpp_additional: ytd.cpp_additional,
        ytd_ei: ytd.ei,
        is_cpp_exempt: snapshot.cpp_exempt,
        is_ei_exempt: snapshot.ei_exempt,
        cpp2_exempt: snapshot.cpp2_exempt,
    }
}

/// Fold a tax-engine result and the request-side holiday gross into the
/// record's computed columns.
pub(crate) fn computed_from_result(
    result: &crate::payroll::tax_client::EmployeeCalcResult,
    gross_holiday: Money,
) -> ComputedFigures {
    ComputedFigures {
        gross_regular: result.gross_regular,
        gross_overtime: result.gross_overtime,
        gross_holiday,
        cpp_base: result.cpp_base,
        cpp_additional: result.cpp_additional,
        ei_employee: result.ei_employee,
        federal_tax: result.federal_tax,
        provincial_tax: result.provincial_tax,
        cpp_employer: result.cpp_employer,
        ei_employer: result.ei_employer,
        net_pay: result.net_pay,
        employer_cost: result.cpp_employer + result.ei_employer,
        new_ytd_gross: result.new_ytd_gross,
        new_ytd_cpp_base: result.new_ytd_cpp_base,
        new_ytd_cpp_additional: result.new_ytd_cpp_additional,
        new_ytd_ei: result.new_ytd_ei,
    }
}

struct RecordLine {
    employee_id: i64,
    snapshot: RecordSnapshot,
    input: RecordInput,
    request: EmployeeCalcRequest,
}

async fn find_active_run(
    pool: &SqlitePool,
    company_id: i64,
    period_end: NaiveDate,
) -> Result<Option<i64>, PayrollError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM payroll_runs
        WHERE company_id = ? AND period_end = ? AND status != 'cancelled'
        "#,
    )
    .bind(company_id)
    .bind(period_end)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

pub(crate) async fn insert_record(
    pool: &SqlitePool,
    run_id: i64,
    company_id: i64,
    employee_id: i64,
    snapshot: &RecordSnapshot,
    input: &RecordInput,
    is_modified: bool,
    computed: &ComputedFigures,
) -> Result<(), PayrollError> {
    let input_json = serde_json::to_string(input)?;

    sqlx::query(
        r#"
        INSERT INTO payroll_records (
            payroll_run_id, employee_id, company_id,
            employee_name_snapshot, province_snapshot,
            annual_salary_snapshot, hourly_rate_snapshot,
            pay_group_id_snapshot, pay_group_name_snapshot,
            pay_group_province_snapshot, pay_frequency_snapshot,
            federal_claim_snapshot, provincial_claim_snapshot,
            cpp_exempt_snapshot, ei_exempt_snapshot, cpp2_exempt_snapshot,
            overtime_multiplier_snapshot,
            input_data, is_modified,
            gross_regular, gross_overtime, gross_holiday,
            cpp_base, cpp_additional, ei_employee,
            federal_tax, provincial_tax,
            cpp_employer, ei_employer,
            net_pay, employer_cost,
            new_ytd_gross, new_ytd_cpp_base, new_ytd_cpp_additional, new_ytd_ei
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run_id)
    .bind(employee_id)
    .bind(company_id)
    .bind(&snapshot.employee_name)
    .bind(snapshot.province)
    .bind(snapshot.annual_salary)
    .bind(snapshot.hourly_rate)
    .bind(snapshot.pay_group_id)
    .bind(&snapshot.pay_group_name)
    .bind(snapshot.pay_group_province)
    .bind(snapshot.pay_frequency)
    .bind(snapshot.federal_claim_amount)
    .bind(snapshot.provincial_claim_amount)
    .bind(snapshot.cpp_exempt)
    .bind(snapshot.ei_exempt)
    .bind(snapshot.cpp2_exempt)
    .bind(snapshot.overtime_multiplier)
    .bind(input_json)
    .bind(is_modified)
    .bind(computed.gross_regular)
    .bind(computed.gross_overtime)
    .bind(computed.gross_holiday)
    .bind(computed.cpp_base)
    .bind(computed.cpp_additional)
    .bind(computed.ei_employee)
    .bind(computed.federal_tax)
    .bind(computed.provincial_tax)
    .bind(computed.cpp_employer)
    .bind(computed.ei_employer)
    .bind(computed.net_pay)
    .bind(computed.employer_cost)
    .bind(computed.new_ytd_gross)
    .bind(computed.new_ytd_cpp_base)
    .bind(computed.new_ytd_cpp_additional)
    .bind(computed.new_ytd_ei)
    .execute(pool)
    .await?;

    Ok(())
}

/// Idempotent run materialization. If a non-cancelled run already exists
/// for (company, period end) it is returned unchanged; otherwise the
/// period is resolved, gross pay computed, the tax batch calculated, and
/// the run plus one record per employee persisted with snapshots captured
/// at this instant.
///
/// The header and records are written in two steps; a record failure
/// triggers a compensating delete of the header so no orphan run survives.
pub async fn create_or_get(
    pool: &SqlitePool,
    tax: &dyn TaxEngine,
    holidays: &HolidayCache,
    pay_date_offset_days: i64,
    company_id: i64,
    period_end: Option<NaiveDate>,
    hours: &[EmployeeHoursInput],
) -> Result<MaterializedRun, PayrollError> {
    if let Some(date) = period_end {
        if let Some(run_id) = find_active_run(pool, company_id, date).await? {
            return Ok(MaterializedRun {
                created: false,
                run_id,
            });
        }
    }

    let resolved = resolve_period(pool, holidays, company_id, period_end)
        .await?
        .ok_or(match period_end {
            Some(date) => PayrollError::NoEmployeesToProcess { period_end: date },
            None => PayrollError::NotFound("pay group"),
        })?;

    if period_end.is_none() {
        if let Some(run_id) = find_active_run(pool, company_id, resolved.period_end).await? {
            return Ok(MaterializedRun {
                created: false,
                run_id,
            });
        }
    }

    let hours_by_employee: HashMap<i64, &EmployeeHoursInput> =
        hours.iter().map(|h| (h.employee_id, h)).collect();

    // Per-employee snapshots, gross amounts and YTD figures, built before
    // any persistence so validation failures leave nothing behind.
    let mut lines: Vec<RecordLine> = Vec::new();
    for group in &resolved.groups {
        for employee in &group.employees {
            let snapshot = RecordSnapshot::capture(employee, &group.group);
            let input = match hours_by_employee.get(&employee.id) {
                Some(h) => RecordInput {
                    regular_hours: Some(h.regular_hours),
                    overtime_hours: h.overtime_hours,
                    ..Default::default()
                },
                None => RecordInput::default(),
            };
            let gross = gross_for_record(employee.id, &snapshot, &input)?;
            let ytd = ytd_for_employee(pool, company_id, employee.id, resolved.period_end).await?;
            let request = calc_request_line(employee.id, &snapshot, gross, ytd);
            lines.push(RecordLine {
                employee_id: employee.id,
                snapshot,
                input,
                request,
            });
        }
    }

    if lines.is_empty() {
        return Err(PayrollError::NoEmployeesToProcess {
            period_end: resolved.period_end,
        });
    }

    let batch = BatchCalcRequest {
        employees: lines.iter().map(|l| l.request.clone()).collect(),
        include_details: false,
    };
    let response = tax.calculate_batch(&batch).await?;

    let results: HashMap<i64, _> = response
        .results
        .iter()
        .map(|r| (r.employee_id, r))
        .collect();
    for line in &lines {
        if !results.contains_key(&line.employee_id) {
            return Err(PayrollError::CalculationFailed(format!(
                "tax engine response missing employee {}",
                line.employee_id
            )));
        }
    }

    let pay_date = resolved.period_end + Days::new(pay_date_offset_days.max(0) as u64);
    let summary = &response.summary;

    let inserted = sqlx::query(
        r#"
        INSERT INTO payroll_runs (
            company_id, period_start, period_end, pay_date, status,
            total_gross, total_cpp_employee, total_cpp_employer,
            total_ei_employee, total_ei_employer,
            total_federal_tax, total_provincial_tax,
            total_net_pay, total_employer_cost
        )
        VALUES (?, ?, ?, ?, 'draft', ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(company_id)
    .bind(resolved.period_start)
    .bind(resolved.period_end)
    .bind(pay_date)
    .bind(summary.total_gross)
    .bind(summary.total_cpp_employee)
    .bind(summary.total_cpp_employer)
    .bind(summary.total_ei_employee)
    .bind(summary.total_ei_employer)
    .bind(summary.total_federal_tax)
    .bind(summary.total_provincial_tax)
    .bind(summary.total_net_pay)
    .bind(summary.total_employer_costs)
    .execute(pool)
    .await;

    let run_id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        // A concurrent caller materialized the same period first; their
        // run is the run.
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            let run_id = find_active_run(pool, company_id, resolved.period_end)
                .await?
                .ok_or(PayrollError::NotFound("payroll run"))?;
            return Ok(MaterializedRun {
                created: false,
                run_id,
            });
        }
        Err(e) => return Err(e.into()),
    };

    for line in &lines {
        let result = results[&line.employee_id];
        let computed = computed_from_result(result, line.request.gross_holiday);
        if let Err(e) = insert_record(
            pool,
            run_id,
            company_id,
            line.employee_id,
            &line.snapshot,
            &line.input,
            false,
            &computed,
        )
        .await
        {
            tracing::error!(
                error = %e,
                run_id,
                employee_id = line.employee_id,
                "Record insert failed, deleting run header"
            );
            let _ = sqlx::query("DELETE FROM payroll_records WHERE payroll_run_id = ?")
                .bind(run_id)
                .execute(pool)
                .await;
            let _ = sqlx::query("DELETE FROM payroll_runs WHERE id = ?")
                .bind(run_id)
                .execute(pool)
                .await;
            return Err(e);
        }
    }

    aggregate::refresh_run_totals(pool, run_id).await?;

    Ok(MaterializedRun {
        created: true,
        run_id,
    })
}
