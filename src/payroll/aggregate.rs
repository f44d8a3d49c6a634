use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::PayrollError;
use crate::model::employee::Province;
use crate::model::holiday::Holiday;
use crate::model::money::Money;
use crate::model::record::PayrollRecord;
use crate::model::run::PayrollRun;
use crate::utils::holiday_cache::HolidayCache;

/// Sums of the record-level computed figures for one grouping.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct TotalsBreakdown {
    pub gross: Money,
    pub cpp_employee: Money,
    pub cpp_employer: Money,
    pub ei_employee: Money,
    pub ei_employer: Money,
    pub federal_tax: Money,
    pub provincial_tax: Money,
    pub net_pay: Money,
    pub employer_cost: Money,
    /// Gross minus net, the contract-stated definition.
    pub deductions: Money,
}

impl TotalsBreakdown {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PayrollRecord>) -> Self {
        let mut totals = TotalsBreakdown::default();
        for record in records {
            let c = &record.computed;
            totals.gross += c.gross();
            totals.cpp_employee += c.cpp_base + c.cpp_additional;
            totals.cpp_employer += c.cpp_employer;
            totals.ei_employee += c.ei_employee;
            totals.ei_employer += c.ei_employer;
            totals.federal_tax += c.federal_tax;
            totals.provincial_tax += c.provincial_tax;
            totals.net_pay += c.net_pay;
            totals.employer_cost += c.employer_cost;
        }
        totals.deductions = totals.gross - totals.net_pay;
        totals
    }

    /// Statutory amounts owed to the tax authority for the grouping.
    pub fn remittance(&self) -> Money {
        self.cpp_employee
            + self.cpp_employer
            + self.ei_employee
            + self.ei_employer
            + self.federal_tax
            + self.provincial_tax
    }

    pub fn payroll_cost(&self) -> Money {
        self.gross + self.employer_cost
    }
}

/// Run-level totals with the derived figures spelled out.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunTotals {
    pub gross: Money,
    pub cpp_employee: Money,
    pub cpp_employer: Money,
    pub ei_employee: Money,
    pub ei_employer: Money,
    pub federal_tax: Money,
    pub provincial_tax: Money,
    pub net_pay: Money,
    pub employer_cost: Money,
    pub deductions: Money,
    pub remittance: Money,
    pub payroll_cost: Money,
}

impl From<TotalsBreakdown> for RunTotals {
    fn from(t: TotalsBreakdown) -> RunTotals {
        let remittance = t.remittance();
        let payroll_cost = t.payroll_cost();
        RunTotals {
            gross: t.gross,
            cpp_employee: t.cpp_employee,
            cpp_employer: t.cpp_employer,
            ei_employee: t.ei_employee,
            ei_employer: t.ei_employer,
            federal_tax: t.federal_tax,
            provincial_tax: t.provincial_tax,
            net_pay: t.net_pay,
            employer_cost: t.employer_cost,
            deductions: t.deductions,
            remittance,
            payroll_cost,
        }
    }
}

/// One pay group's slice of a run, grouped by the snapshotted pay-group
/// id. Live pay-group rows are never consulted here.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayGroupSection {
    pub pay_group_id: i64,
    pub pay_group_name: String,
    pub province: Province,
    pub holidays: Vec<Holiday>,
    pub totals: TotalsBreakdown,
    pub records: Vec<PayrollRecord>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunWithGroups {
    #[serde(flatten)]
    #[schema(inline)]
    pub run: PayrollRun,
    pub totals: RunTotals,
    pub groups: Vec<PayGroupSection>,
}

pub async fn load_run(
    pool: &SqlitePool,
    company_id: i64,
    run_id: i64,
) -> Result<PayrollRun, PayrollError> {
    sqlx::query_as::<_, PayrollRun>(
        r#"
        SELECT id, company_id, period_start, period_end, pay_date, status,
               total_gross, total_cpp_employee, total_cpp_employer,
               total_ei_employee, total_ei_employer,
               total_federal_tax, total_provincial_tax,
               total_net_pay, total_employer_cost, created_at
        FROM payroll_runs
        WHERE id = ? AND company_id = ?
        "#,
    )
    .bind(run_id)
    .bind(company_id)
    .fetch_optional(pool)
    .await?
    .ok_or(PayrollError::NotFound("payroll run"))
}

pub async fn load_records(
    pool: &SqlitePool,
    run_id: i64,
) -> Result<Vec<PayrollRecord>, PayrollError> {
    Ok(sqlx::query_as::<_, PayrollRecord>(
        "SELECT * FROM payroll_records WHERE payroll_run_id = ? ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?)
}

/// Re-derive the denormalized run totals from the authoritative record
/// set. Called after every record change; the stored columns are only a
/// read optimization.
pub async fn refresh_run_totals(
    pool: &SqlitePool,
    run_id: i64,
) -> Result<TotalsBreakdown, PayrollError> {
    let records = load_records(pool, run_id).await?;
    let totals = TotalsBreakdown::from_records(&records);

    sqlx::query(
        r#"
        UPDATE payroll_runs
        SET total_gross = ?, total_cpp_employee = ?, total_cpp_employer = ?,
            total_ei_employee = ?, total_ei_employer = ?,
            total_federal_tax = ?, total_provincial_tax = ?,
            total_net_pay = ?, total_employer_cost = ?
        WHERE id = ?
        "#,
    )
    .bind(totals.gross)
    .bind(totals.cpp_employee)
    .bind(totals.cpp_employer)
    .bind(totals.ei_employee)
    .bind(totals.ei_employer)
    .bind(totals.federal_tax)
    .bind(totals.provincial_tax)
    .bind(totals.net_pay)
    .bind(totals.employer_cost)
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(totals)
}

/// The full run projection: header, run totals, and per-pay-group
/// sections with period holidays attached.
pub async fn load_run_with_groups(
    pool: &SqlitePool,
    holidays: &HolidayCache,
    company_id: i64,
    run_id: i64,
) -> Result<RunWithGroups, PayrollError> {
    let run = load_run(pool, company_id, run_id).await?;
    let records = load_records(pool, run_id).await?;

    let mut by_group: BTreeMap<i64, Vec<PayrollRecord>> = BTreeMap::new();
    for record in records {
        by_group
            .entry(record.snapshot.pay_group_id)
            .or_default()
            .push(record);
    }

    let mut groups = Vec::with_capacity(by_group.len());
    for (pay_group_id, records) in by_group {
        let snapshot = &records[0].snapshot;
        let window_start = snapshot.pay_frequency.period_start(run.period_end);
        let group_holidays = holidays
            .in_range(pool, snapshot.pay_group_province, window_start, run.period_end)
            .await?;

        groups.push(PayGroupSection {
            pay_group_id,
            pay_group_name: snapshot.pay_group_name.clone(),
            province: snapshot.pay_group_province,
            holidays: group_holidays,
            totals: TotalsBreakdown::from_records(&records),
            records,
        });
    }

    let totals = RunTotals::from(TotalsBreakdown::from_records(
        groups.iter().flat_map(|g| g.records.iter()),
    ));

    Ok(RunWithGroups { run, totals, groups })
}
