use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::PayrollError;
use crate::model::employee::Employee;
use crate::model::holiday::Holiday;
use crate::model::pay_group::PayGroup;
use crate::utils::holiday_cache::HolidayCache;

/// One pay group closing on the resolved date, with its eligible roster
/// and the statutory holidays inside the period.
#[derive(Debug, Clone)]
pub struct ResolvedPayGroup {
    pub group: PayGroup,
    pub employees: Vec<Employee>,
    pub holidays: Vec<Holiday>,
}

#[derive(Debug, Clone)]
pub struct ResolvedPeriod {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub groups: Vec<ResolvedPayGroup>,
}

/// Determine which pay groups close on `period_end` (or, when `None`, on
/// the earliest upcoming period end for the company), their active
/// rosters, and the holidays falling inside each group's period.
///
/// No pay group closing on the date is an empty result, not a failure.
pub async fn resolve_period(
    pool: &SqlitePool,
    holidays: &HolidayCache,
    company_id: i64,
    period_end: Option<NaiveDate>,
) -> Result<Option<ResolvedPeriod>, PayrollError> {
    let period_end = match period_end {
        Some(date) => date,
        None => {
            // MIN over zero rows yields a NULL row, hence the nested Option.
            let next = sqlx::query_scalar::<_, Option<NaiveDate>>(
                "SELECT MIN(next_period_end) FROM pay_groups WHERE company_id = ?",
            )
            .bind(company_id)
            .fetch_one(pool)
            .await?;
            match next {
                Some(date) => date,
                None => return Ok(None),
            }
        }
    };

    let groups = sqlx::query_as::<_, PayGroup>(
        r#"
        SELECT id, company_id, name, province, pay_frequency, employment_type,
               next_period_end, overtime_multiplier, cpp_exempt, ei_exempt, cpp2_exempt
        FROM pay_groups
        WHERE company_id = ? AND next_period_end = ?
        ORDER BY id
        "#,
    )
    .bind(company_id)
    .bind(period_end)
    .fetch_all(pool)
    .await?;

    if groups.is_empty() {
        return Ok(None);
    }

    let mut resolved = Vec::with_capacity(groups.len());
    let mut earliest_start = period_end;

    for group in groups {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, company_id, pay_group_id, first_name, last_name, province,
                   annual_salary, hourly_rate, federal_claim_amount,
                   provincial_claim_amount, status
            FROM employees
            WHERE company_id = ? AND pay_group_id = ? AND status = 'active'
            ORDER BY id
            "#,
        )
        .bind(company_id)
        .bind(group.id)
        .fetch_all(pool)
        .await?;

        let start = group.pay_frequency.period_start(period_end);
        earliest_start = earliest_start.min(start);

        let group_holidays = holidays
            .in_range(pool, group.province, start, period_end)
            .await?;

        resolved.push(ResolvedPayGroup {
            group,
            employees,
            holidays: group_holidays,
        });
    }

    Ok(Some(ResolvedPeriod {
        period_start: earliest_start,
        period_end,
        groups: resolved,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::payroll::testkit;

    #[actix_web::test]
    async fn resolves_closing_groups_with_roster_and_holidays() {
        let pool = test_pool().await;
        let cache = HolidayCache::new();
        let company = testkit::seed_company(&pool).await;
        let group = testkit::seed_biweekly_group(&pool, company, "2026-03-14").await;
        testkit::seed_salaried(&pool, company, group, "Avery", "Holt", "78000").await;
        testkit::seed_holiday(&pool, "2026-03-06", "Test Day", "SK").await;
        // Outside the period window, must not appear.
        testkit::seed_holiday(&pool, "2026-02-14", "Early Day", "SK").await;

        let resolved = resolve_period(&pool, &cache, company, Some("2026-03-14".parse().unwrap()))
            .await
            .unwrap()
            .expect("one group closes");

        assert_eq!(resolved.period_start, "2026-03-01".parse().unwrap());
        assert_eq!(resolved.groups.len(), 1);
        assert_eq!(resolved.groups[0].employees.len(), 1);
        assert_eq!(resolved.groups[0].holidays.len(), 1);
        assert_eq!(resolved.groups[0].holidays[0].name, "Test Day");
    }

    #[actix_web::test]
    async fn no_closing_group_is_empty_not_error() {
        let pool = test_pool().await;
        let cache = HolidayCache::new();
        let company = testkit::seed_company(&pool).await;
        testkit::seed_biweekly_group(&pool, company, "2026-03-14").await;

        let resolved = resolve_period(&pool, &cache, company, Some("2026-03-21".parse().unwrap()))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[actix_web::test]
    async fn next_sentinel_picks_earliest_period_end() {
        let pool = test_pool().await;
        let cache = HolidayCache::new();
        let company = testkit::seed_company(&pool).await;
        testkit::seed_biweekly_group(&pool, company, "2026-03-28").await;
        testkit::seed_biweekly_group(&pool, company, "2026-03-14").await;

        let resolved = resolve_period(&pool, &cache, company, None)
            .await
            .unwrap()
            .expect("groups exist");
        assert_eq!(resolved.period_end, "2026-03-14".parse().unwrap());
        assert_eq!(resolved.groups.len(), 1);
    }

    #[actix_web::test]
    async fn terminated_employees_are_excluded() {
        let pool = test_pool().await;
        let cache = HolidayCache::new();
        let company = testkit::seed_company(&pool).await;
        let group = testkit::seed_biweekly_group(&pool, company, "2026-03-14").await;
        testkit::seed_salaried(&pool, company, group, "Avery", "Holt", "78000").await;
        let gone = testkit::seed_salaried(&pool, company, group, "Old", "Hand", "60000").await;
        testkit::terminate_employee(&pool, gone).await;

        let resolved = resolve_period(&pool, &cache, company, Some("2026-03-14".parse().unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.groups[0].employees.len(), 1);
    }
}
