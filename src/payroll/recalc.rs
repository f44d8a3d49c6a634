use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::error::PayrollError;
use crate::model::record::ComputedFigures;
use crate::model::run::RunStatus;
use crate::payroll::aggregate;
use crate::payroll::gross::gross_for_record;
use crate::payroll::materializer::{calc_request_line, computed_from_result, ytd_for_employee};
use crate::payroll::tax_client::{BatchCalcRequest, TaxEngine};

/// True while any record in the run carries edits that have not been
/// recalculated. The status machine uses this to refuse leaving draft.
pub async fn has_modified_records(pool: &SqlitePool, run_id: i64) -> Result<bool, PayrollError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM payroll_records WHERE payroll_run_id = ? AND is_modified = 1)",
    )
    .bind(run_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

async fn write_computed(
    pool: &SqlitePool,
    record_id: i64,
    computed: &ComputedFigures,
) -> Result<(), PayrollError> {
    sqlx::query(
        r#"
        UPDATE payroll_records
        SET gross_regular = ?, gross_overtime = ?, gross_holiday = ?,
            cpp_base = ?, cpp_additional = ?, ei_employee = ?,
            federal_tax = ?, provincial_tax = ?,
            cpp_employer = ?, ei_employer = ?,
            net_pay = ?, employer_cost = ?,
            new_ytd_gross = ?, new_ytd_cpp_base = ?,
            new_ytd_cpp_additional = ?, new_ytd_ei = ?,
            is_modified = 0
        WHERE id = ?
        "#,
    )
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
    .bind(record_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Rebuild the tax batch from every record's stored input, overwrite the
/// computed fields with fresh results, clear the modified flags, and
/// re-derive the run totals. The batch call is all-or-nothing: a failure
/// leaves every record exactly as it was.
pub async fn recalculate(
    pool: &SqlitePool,
    tax: &dyn TaxEngine,
    company_id: i64,
    run_id: i64,
) -> Result<(), PayrollError> {
    let run = aggregate::load_run(pool, company_id, run_id).await?;
    if run.status != RunStatus::Draft {
        return Err(PayrollError::RunNotEditable { status: run.status });
    }

    let records = aggregate::load_records(pool, run_id).await?;
    if records.is_empty() {
        aggregate::refresh_run_totals(pool, run_id).await?;
        return Ok(());
    }

    let mut request_lines = Vec::with_capacity(records.len());
    let mut holiday_gross = HashMap::new();
    for record in &records {
        let gross = gross_for_record(record.employee_id, &record.snapshot, &record.input)?;
        let ytd = ytd_for_employee(pool, company_id, record.employee_id, run.period_end).await?;
        holiday_gross.insert(record.employee_id, gross.holiday);
        request_lines.push(calc_request_line(record.employee_id, &record.snapshot, gross, ytd));
    }

    let response = tax
        .calculate_batch(&BatchCalcRequest {
            employees: request_lines,
            include_details: false,
        })
        .await?;

    let results: HashMap<i64, _> = response
        .results
        .iter()
        .map(|r| (r.employee_id, r))
        .collect();

    for record in &records {
        let result = results
            .get(&record.employee_id)
            .ok_or_else(|| {
                PayrollError::CalculationFailed(format!(
                    "tax engine response missing employee {}",
                    record.employee_id
                ))
            })?;
        let computed = computed_from_result(result, holiday_gross[&record.employee_id]);
        write_computed(pool, record.id, &computed).await?;
    }

    aggregate::refresh_run_totals(pool, run_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::model::money::Money;
    use crate::model::record::RecordInputPatch;
    use crate::payroll::materializer::create_or_get;
    use crate::payroll::mutation::update_record;
    use crate::payroll::testkit::{self, FailingTaxEngine, MockTaxEngine};
    use crate::utils::holiday_cache::HolidayCache;
    use rust_decimal_macros::dec;

    async fn hourly_run(pool: &SqlitePool) -> (i64, i64, i64) {
        let cache = HolidayCache::new();
        let company = testkit::seed_company(pool).await;
        let group = testkit::seed_biweekly_group(pool, company, "2026-03-14").await;
        let employee = testkit::seed_hourly(pool, company, group, "Briar", "Lane", "25.00").await;
        let hours = [crate::payroll::materializer::EmployeeHoursInput {
            employee_id: employee,
            regular_hours: dec!(80),
            overtime_hours: None,
        }];
        let run = create_or_get(
            pool,
            &MockTaxEngine,
            &cache,
            6,
            company,
            Some("2026-03-14".parse().unwrap()),
            &hours,
        )
        .await
        .unwrap();
        let record_id =
            sqlx::query_scalar::<_, i64>("SELECT id FROM payroll_records WHERE payroll_run_id = ?")
                .bind(run.run_id)
                .fetch_one(pool)
                .await
                .unwrap();
        (company, run.run_id, record_id)
    }

    #[actix_web::test]
    async fn recomputes_from_stored_input_and_clears_flags() {
        let pool = test_pool().await;
        let (company, run_id, record_id) = hourly_run(&pool).await;

        update_record(
            &pool,
            company,
            run_id,
            record_id,
            RecordInputPatch {
                regular_hours: Some(dec!(88)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(has_modified_records(&pool, run_id).await.unwrap());

        recalculate(&pool, &MockTaxEngine, company, run_id)
            .await
            .unwrap();

        assert!(!has_modified_records(&pool, run_id).await.unwrap());
        let records = aggregate::load_records(&pool, run_id).await.unwrap();
        assert_eq!(records[0].computed.gross_regular, Money(dec!(2200.00)));

        // Run totals were re-derived from the fresh record set.
        let run = aggregate::load_run(&pool, company, run_id).await.unwrap();
        assert_eq!(run.total_gross, Money(dec!(2200.00)));
    }

    #[actix_web::test]
    async fn failed_batch_leaves_records_untouched() {
        let pool = test_pool().await;
        let (company, run_id, record_id) = hourly_run(&pool).await;

        update_record(
            &pool,
            company,
            run_id,
            record_id,
            RecordInputPatch {
                regular_hours: Some(dec!(88)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = recalculate(&pool, &FailingTaxEngine, company, run_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PayrollError::CalculationFailed(_)));

        // Still flagged, still carrying the pre-edit figures.
        assert!(has_modified_records(&pool, run_id).await.unwrap());
        let records = aggregate::load_records(&pool, run_id).await.unwrap();
        assert_eq!(records[0].computed.gross_regular, Money(dec!(2000.00)));
    }

    #[actix_web::test]
    async fn rejects_non_draft_runs() {
        let pool = test_pool().await;
        let (company, run_id, _) = hourly_run(&pool).await;
        sqlx::query("UPDATE payroll_runs SET status = 'approved' WHERE id = ?")
            .bind(run_id)
            .execute(&pool)
            .await
            .unwrap();

        let err = recalculate(&pool, &MockTaxEngine, company, run_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PayrollError::RunNotEditable { .. }));
    }
}
