use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::PayrollError;
use crate::model::money::Money;
use crate::model::record::RecordInput;
use crate::model::run::PayrollRun;

/// A per-employee paystub failure surfaced on approval. These never
/// block the transition.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaystubError {
    pub employee_id: i64,
    pub employee_name: String,
    pub message: String,
}

/// Rows are read loosely here: a record whose stored input fails to
/// parse should cost that employee a paystub, not the whole batch.
#[derive(sqlx::FromRow)]
struct StubRow {
    id: i64,
    employee_id: i64,
    employee_name_snapshot: String,
    pay_group_name_snapshot: String,
    province_snapshot: String,
    input_data: String,
    gross_regular: Money,
    gross_overtime: Money,
    gross_holiday: Money,
    cpp_base: Money,
    cpp_additional: Money,
    ei_employee: Money,
    federal_tax: Money,
    provincial_tax: Money,
    net_pay: Money,
}

fn render(run: &PayrollRun, row: &StubRow, input: &RecordInput) -> String {
    let gross = row.gross_regular + row.gross_overtime + row.gross_holiday;
    let mut lines = vec![
        format!("PAY STATEMENT - {}", row.employee_name_snapshot),
        format!("Pay group: {} ({})", row.pay_group_name_snapshot, row.province_snapshot),
        format!(
            "Period: {} to {}   Pay date: {}",
            run.period_start, run.period_end, run.pay_date
        ),
        String::new(),
    ];
    if let Some(hours) = input.regular_hours {
        lines.push(format!("Regular hours: {hours}"));
    }
    if let Some(hours) = input.overtime_hours {
        lines.push(format!("Overtime hours: {hours}"));
    }
    lines.push(format!("Regular pay:      {}", row.gross_regular));
    if row.gross_overtime != Money::ZERO {
        lines.push(format!("Overtime pay:     {}", row.gross_overtime));
    }
    if row.gross_holiday != Money::ZERO {
        lines.push(format!("Holiday pay:      {}", row.gross_holiday));
    }
    lines.push(format!("Gross pay:        {gross}"));
    lines.push(String::new());
    lines.push(format!("CPP:              {}", row.cpp_base + row.cpp_additional));
    lines.push(format!("EI:               {}", row.ei_employee));
    lines.push(format!("Federal tax:      {}", row.federal_tax));
    lines.push(format!("Provincial tax:   {}", row.provincial_tax));
    lines.push(String::new());
    lines.push(format!("NET PAY:          {}", row.net_pay));
    lines.join("\n")
}

/// Generate and persist one paystub document per record in the run.
/// Individual failures are collected and returned; only storage-level
/// errors abort the whole pass.
pub async fn generate_for_run(
    pool: &SqlitePool,
    run: &PayrollRun,
) -> Result<Vec<PaystubError>, PayrollError> {
    let rows = sqlx::query_as::<_, StubRow>(
        r#"
        SELECT id, employee_id, employee_name_snapshot, pay_group_name_snapshot,
               province_snapshot, input_data,
               gross_regular, gross_overtime, gross_holiday,
               cpp_base, cpp_additional, ei_employee,
               federal_tax, provincial_tax, net_pay
        FROM payroll_records
        WHERE payroll_run_id = ?
        ORDER BY id
        "#,
    )
    .bind(run.id)
    .fetch_all(pool)
    .await?;

    let mut errors = Vec::new();
    for row in rows {
        let input: RecordInput = match serde_json::from_str(&row.input_data) {
            Ok(input) => input,
            Err(err) => {
                tracing::warn!(
                    employee_id = row.employee_id,
                    %err,
                    "Skipping paystub for unreadable record input"
                );
                errors.push(PaystubError {
                    employee_id: row.employee_id,
                    employee_name: row.employee_name_snapshot.clone(),
                    message: format!("record input could not be read: {err}"),
                });
                continue;
            }
        };

        let content = render(run, &row, &input);
        sqlx::query(
            r#"
            INSERT INTO paystub_documents (id, payroll_run_id, payroll_record_id, employee_name, content)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(run.id)
        .bind(row.id)
        .bind(&row.employee_name_snapshot)
        .bind(&content)
        .execute(pool)
        .await?;
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::payroll::aggregate;
    use crate::payroll::materializer::{create_or_get, EmployeeHoursInput};
    use crate::payroll::testkit::{self, MockTaxEngine};
    use crate::utils::holiday_cache::HolidayCache;
    use rust_decimal_macros::dec;

    #[actix_web::test]
    async fn renders_hours_and_figures_into_the_document() {
        let pool = test_pool().await;
        let cache = HolidayCache::new();
        let company = testkit::seed_company(&pool).await;
        let group = testkit::seed_biweekly_group(&pool, company, "2026-03-14").await;
        let hourly = testkit::seed_hourly(&pool, company, group, "Briar", "Lane", "25.00").await;
        let hours = [EmployeeHoursInput {
            employee_id: hourly,
            regular_hours: dec!(80),
            overtime_hours: Some(dec!(4)),
        }];
        let run_id = create_or_get(
            &pool,
            &MockTaxEngine,
            &cache,
            6,
            company,
            Some("2026-03-14".parse().unwrap()),
            &hours,
        )
        .await
        .unwrap()
        .run_id;

        let run = aggregate::load_run(&pool, company, run_id).await.unwrap();
        let errors = generate_for_run(&pool, &run).await.unwrap();
        assert!(errors.is_empty());

        let content = sqlx::query_scalar::<_, String>(
            "SELECT content FROM paystub_documents WHERE payroll_run_id = ?",
        )
        .bind(run_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(content.contains("Briar Lane"));
        assert!(content.contains("Regular hours: 80"));
        assert!(content.contains("Overtime hours: 4"));
        assert!(content.contains("Overtime pay:     150.00"));
        assert!(content.contains("Pay date: 2026-03-20"));
    }

    #[actix_web::test]
    async fn one_bad_record_does_not_stop_the_rest() {
        let pool = test_pool().await;
        let cache = HolidayCache::new();
        let company = testkit::seed_company(&pool).await;
        let group = testkit::seed_biweekly_group(&pool, company, "2026-03-14").await;
        testkit::seed_salaried(&pool, company, group, "Avery", "Holt", "78000").await;
        let broken =
            testkit::seed_salaried(&pool, company, group, "Jesse", "Okafor", "60000").await;
        let run_id = create_or_get(
            &pool,
            &MockTaxEngine,
            &cache,
            6,
            company,
            Some("2026-03-14".parse().unwrap()),
            &[],
        )
        .await
        .unwrap()
        .run_id;

        sqlx::query("UPDATE payroll_records SET input_data = '{broken' WHERE employee_id = ?")
            .bind(broken)
            .execute(&pool)
            .await
            .unwrap();

        let run = aggregate::load_run(&pool, company, run_id).await.unwrap();
        let errors = generate_for_run(&pool, &run).await.unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].employee_id, broken);
        assert_eq!(errors[0].employee_name, "Jesse Okafor");

        let stubs = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM paystub_documents WHERE payroll_run_id = ?",
        )
        .bind(run_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(stubs, 1);
    }
}
