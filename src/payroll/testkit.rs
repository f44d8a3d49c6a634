//! Seed helpers and a deterministic in-process tax engine for tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::SqlitePool;

use crate::error::PayrollError;
use crate::model::money::Money;
use crate::payroll::tax_client::{
    BatchCalcRequest, BatchCalcResponse, BatchSummary, EmployeeCalcResult, TaxEngine,
};

pub async fn seed_company(pool: &SqlitePool) -> i64 {
    sqlx::query("INSERT INTO companies (name, province) VALUES ('Prairie Harvest Co', 'SK')")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_group(
    pool: &SqlitePool,
    company_id: i64,
    name: &str,
    frequency: &str,
    next_period_end: &str,
) -> i64 {
    sqlx::query(
        r#"
        INSERT INTO pay_groups
            (company_id, name, province, pay_frequency, employment_type, next_period_end)
        VALUES (?, ?, 'SK', ?, 'full_time', ?)
        "#,
    )
    .bind(company_id)
    .bind(name)
    .bind(frequency)
    .bind(next_period_end)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn seed_biweekly_group(pool: &SqlitePool, company_id: i64, next_period_end: &str) -> i64 {
    seed_group(pool, company_id, "Operations", "bi_weekly", next_period_end).await
}

pub async fn seed_salaried(
    pool: &SqlitePool,
    company_id: i64,
    pay_group_id: i64,
    first: &str,
    last: &str,
    annual_salary: &str,
) -> i64 {
    sqlx::query(
        r#"
        INSERT INTO employees
            (company_id, pay_group_id, first_name, last_name, province, annual_salary)
        VALUES (?, ?, ?, ?, 'SK', ?)
        "#,
    )
    .bind(company_id)
    .bind(pay_group_id)
    .bind(first)
    .bind(last)
    .bind(annual_salary)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn seed_hourly(
    pool: &SqlitePool,
    company_id: i64,
    pay_group_id: i64,
    first: &str,
    last: &str,
    hourly_rate: &str,
) -> i64 {
    sqlx::query(
        r#"
        INSERT INTO employees
            (company_id, pay_group_id, first_name, last_name, province, hourly_rate)
        VALUES (?, ?, ?, ?, 'SK', ?)
        "#,
    )
    .bind(company_id)
    .bind(pay_group_id)
    .bind(first)
    .bind(last)
    .bind(hourly_rate)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn seed_holiday(pool: &SqlitePool, date: &str, name: &str, province: &str) {
    sqlx::query("INSERT INTO holidays (date, name, province) VALUES (?, ?, ?)")
        .bind(date)
        .bind(name)
        .bind(province)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn terminate_employee(pool: &SqlitePool, employee_id: i64) {
    sqlx::query("UPDATE employees SET status = 'terminated' WHERE id = ?")
        .bind(employee_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn assign_group(pool: &SqlitePool, employee_id: i64, pay_group_id: Option<i64>) {
    sqlx::query("UPDATE employees SET pay_group_id = ? WHERE id = ?")
        .bind(pay_group_id)
        .bind(employee_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Deterministic flat-rate engine: CPP 5.95%, EI 1.64%, federal 15%,
/// provincial 5%, employer EI at 1.4x. Net pay is gross minus statutory
/// deductions by construction, so the aggregation identities hold exactly.
pub struct MockTaxEngine;

#[async_trait]
impl TaxEngine for MockTaxEngine {
    async fn calculate_batch(
        &self,
        request: &BatchCalcRequest,
    ) -> Result<BatchCalcResponse, PayrollError> {
        let mut results = Vec::with_capacity(request.employees.len());
        let mut summary = BatchSummary::default();

        for employee in &request.employees {
            let gross = employee.gross_regular + employee.gross_overtime + employee.gross_holiday;

            let pct = |rate: Decimal| (gross * rate).round_cents();
            let cpp_base = if employee.is_cpp_exempt {
                Money::ZERO
            } else {
                pct(dec!(0.0595))
            };
            let ei_employee = if employee.is_ei_exempt {
                Money::ZERO
            } else {
                pct(dec!(0.0164))
            };
            let federal_tax = pct(dec!(0.15));
            let provincial_tax = pct(dec!(0.05));
            let cpp_employer = cpp_base;
            let ei_employer = (ei_employee * dec!(1.4)).round_cents();

            let deductions = cpp_base + ei_employee + federal_tax + provincial_tax;
            let net_pay = gross - deductions;

            summary.total_gross += gross;
            summary.total_cpp_employee += cpp_base;
            summary.total_cpp_employer += cpp_employer;
            summary.total_ei_employee += ei_employee;
            summary.total_ei_employer += ei_employer;
            summary.total_federal_tax += federal_tax;
            summary.total_provincial_tax += provincial_tax;
            summary.total_net_pay += net_pay;
            summary.total_employer_costs += cpp_employer + ei_employer;

            results.push(EmployeeCalcResult {
                employee_id: employee.employee_id,
                gross_regular: employee.gross_regular,
                gross_overtime: employee.gross_overtime,
                cpp_base,
                cpp_additional: Money::ZERO,
                ei_employee,
                federal_tax,
                provincial_tax,
                cpp_employer,
                ei_employer,
                net_pay,
                new_ytd_gross: employee.ytd_gross + gross,
                new_ytd_cpp_base: employee.ytd_cpp_base + cpp_base,
                new_ytd_cpp_additional: employee.ytd_cpp_additional,
                new_ytd_ei: employee.ytd_ei + ei_employee,
            });
        }

        Ok(BatchCalcResponse { results, summary })
    }
}

/// Always-unreachable engine for atomicity tests.
pub struct FailingTaxEngine;

#[async_trait]
impl TaxEngine for FailingTaxEngine {
    async fn calculate_batch(
        &self,
        _request: &BatchCalcRequest,
    ) -> Result<BatchCalcResponse, PayrollError> {
        Err(PayrollError::CalculationFailed(
            "tax engine unreachable: connection refused".to_string(),
        ))
    }
}
