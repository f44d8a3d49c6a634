use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::PayrollError;
use crate::model::employee::Employee;
use crate::model::pay_group::PayGroup;
use crate::model::record::{ComputedFigures, RecordInput, RecordSnapshot};
use crate::model::run::RunStatus;
use crate::payroll::aggregate;
use crate::payroll::materializer;

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SyncOutcome {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
}

/// Reconcile a draft run's records with the current rosters of its pay
/// groups. New members get a record with freshly captured snapshots,
/// empty input and zeroed figures, flagged for recalculation; members
/// who left (or were terminated) lose theirs. No tax call happens here,
/// so the run cannot leave draft until it is recalculated.
pub async fn sync_membership(
    pool: &SqlitePool,
    company_id: i64,
    run_id: i64,
) -> Result<SyncOutcome, PayrollError> {
    let run = aggregate::load_run(pool, company_id, run_id).await?;
    if run.status != RunStatus::Draft {
        return Err(PayrollError::RunNotEditable { status: run.status });
    }

    // (record id, employee, snapshotted group) for every existing record.
    let existing = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT id, employee_id, pay_group_id_snapshot FROM payroll_records WHERE payroll_run_id = ?",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    let group_ids: HashSet<i64> = existing.iter().map(|(_, _, g)| *g).collect();
    if group_ids.is_empty() {
        return Ok(SyncOutcome::default());
    }

    let mut groups: HashMap<i64, PayGroup> = HashMap::new();
    let mut roster: HashMap<i64, Employee> = HashMap::new();
    for group_id in &group_ids {
        let group = sqlx::query_as::<_, PayGroup>(
            r#"
            SELECT id, company_id, name, province, pay_frequency, employment_type,
                   next_period_end, overtime_multiplier, cpp_exempt, ei_exempt, cpp2_exempt
            FROM pay_groups
            WHERE id = ? AND company_id = ?
            "#,
        )
        .bind(group_id)
        .bind(company_id)
        .fetch_optional(pool)
        .await?;
        let Some(group) = group else {
            // Snapshotted group was deleted; its members fall out below.
            continue;
        };

        let members = sqlx::query_as::<_, Employee>(
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
        for member in members {
            roster.insert(member.id, member);
        }
        groups.insert(group.id, group);
    }

    let mut outcome = SyncOutcome::default();

    // A record survives only while its employee is still an active member
    // of the group it was snapshotted under. A reassignment between two of
    // the run's groups is a removal plus a fresh addition.
    let mut kept: HashSet<i64> = HashSet::new();
    for (record_id, employee_id, snapshot_group) in &existing {
        let still_member = roster
            .get(employee_id)
            .is_some_and(|e| e.pay_group_id == Some(*snapshot_group));
        if still_member {
            kept.insert(*employee_id);
        } else {
            sqlx::query("DELETE FROM payroll_records WHERE id = ?")
                .bind(record_id)
                .execute(pool)
                .await?;
            outcome.removed.push(*employee_id);
        }
    }

    let mut additions: Vec<&Employee> = roster
        .values()
        .filter(|e| !kept.contains(&e.id))
        .collect();
    additions.sort_by_key(|e| e.id);

    for employee in additions {
        let group = employee
            .pay_group_id
            .and_then(|id| groups.get(&id))
            .ok_or(PayrollError::NotFound("pay group"))?;
        let snapshot = RecordSnapshot::capture(employee, group);
        materializer::insert_record(
            pool,
            run_id,
            company_id,
            employee.id,
            &snapshot,
            &RecordInput::default(),
            true,
            &ComputedFigures::default(),
        )
        .await?;
        outcome.added.push(employee.id);
    }

    if !outcome.added.is_empty() || !outcome.removed.is_empty() {
        tracing::info!(
            run_id,
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            "Synchronized run membership"
        );
        aggregate::refresh_run_totals(pool, run_id).await?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::model::money::Money;
    use crate::payroll::materializer::create_or_get;
    use crate::payroll::recalc;
    use crate::payroll::testkit::{self, MockTaxEngine};
    use crate::utils::holiday_cache::HolidayCache;
    use rust_decimal_macros::dec;

    async fn seeded_run(pool: &SqlitePool) -> (i64, i64, i64) {
        let cache = HolidayCache::new();
        let company = testkit::seed_company(pool).await;
        let group = testkit::seed_biweekly_group(pool, company, "2026-03-14").await;
        testkit::seed_salaried(pool, company, group, "Avery", "Holt", "78000").await;
        let run = create_or_get(
            pool,
            &MockTaxEngine,
            &cache,
            6,
            company,
            Some("2026-03-14".parse().unwrap()),
            &[],
        )
        .await
        .unwrap();
        (company, group, run.run_id)
    }

    #[actix_web::test]
    async fn new_hire_gets_a_flagged_empty_record() {
        let pool = test_pool().await;
        let (company, group, run_id) = seeded_run(&pool).await;

        let hire = testkit::seed_salaried(&pool, company, group, "Noor", "Said", "66000").await;
        let outcome = sync_membership(&pool, company, run_id).await.unwrap();
        assert_eq!(outcome.added, vec![hire]);
        assert!(outcome.removed.is_empty());

        let records = aggregate::load_records(&pool, run_id).await.unwrap();
        assert_eq!(records.len(), 2);
        let added = records.iter().find(|r| r.employee_id == hire).unwrap();
        assert!(added.is_modified);
        assert_eq!(added.computed.net_pay, Money::ZERO);
        assert_eq!(added.snapshot.annual_salary, Some(Money(dec!(66000))));

        // The flag keeps the run in draft until recalculated.
        assert!(recalc::has_modified_records(&pool, run_id).await.unwrap());
        recalc::recalculate(&pool, &MockTaxEngine, company, run_id)
            .await
            .unwrap();
        let records = aggregate::load_records(&pool, run_id).await.unwrap();
        let added = records.iter().find(|r| r.employee_id == hire).unwrap();
        assert_eq!(added.computed.gross_regular, Money(dec!(2538.46)));
    }

    #[actix_web::test]
    async fn departed_member_loses_their_record() {
        let pool = test_pool().await;
        let (company, group, run_id) = seeded_run(&pool).await;
        let gone = testkit::seed_salaried(&pool, company, group, "Old", "Hand", "60000").await;
        let outcome = sync_membership(&pool, company, run_id).await.unwrap();
        assert_eq!(outcome.added, vec![gone]);

        testkit::terminate_employee(&pool, gone).await;
        let outcome = sync_membership(&pool, company, run_id).await.unwrap();
        assert!(outcome.added.is_empty());
        assert_eq!(outcome.removed, vec![gone]);

        let records = aggregate::load_records(&pool, run_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| r.employee_id != gone));
    }

    #[actix_web::test]
    async fn reassignment_out_of_run_groups_removes() {
        let pool = test_pool().await;
        let (company, group, run_id) = seeded_run(&pool).await;
        let mover = testkit::seed_salaried(&pool, company, group, "Rae", "Singh", "72000").await;
        sync_membership(&pool, company, run_id).await.unwrap();

        // Monthly group outside this run.
        let other =
            testkit::seed_group(&pool, company, "Office", "monthly", "2026-03-31").await;
        testkit::assign_group(&pool, mover, Some(other)).await;

        let outcome = sync_membership(&pool, company, run_id).await.unwrap();
        assert_eq!(outcome.removed, vec![mover]);
        let records = aggregate::load_records(&pool, run_id).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[actix_web::test]
    async fn rejects_non_draft_runs() {
        let pool = test_pool().await;
        let (company, _, run_id) = seeded_run(&pool).await;
        sqlx::query("UPDATE payroll_runs SET status = 'approved' WHERE id = ?")
            .bind(run_id)
            .execute(&pool)
            .await
            .unwrap();

        let err = sync_membership(&pool, company, run_id).await.unwrap_err();
        assert!(matches!(err, PayrollError::RunNotEditable { .. }));
    }

    #[actix_web::test]
    async fn run_totals_drop_after_removal() {
        let pool = test_pool().await;
        let (company, _, run_id) = seeded_run(&pool).await;
        let before = aggregate::load_run(&pool, company, run_id).await.unwrap();
        assert_eq!(before.total_gross, Money(dec!(3000.00)));

        let gone = sqlx::query_scalar::<_, i64>(
            "SELECT employee_id FROM payroll_records WHERE payroll_run_id = ?",
        )
        .bind(run_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        testkit::terminate_employee(&pool, gone).await;
        sync_membership(&pool, company, run_id).await.unwrap();

        let after = aggregate::load_run(&pool, company, run_id).await.unwrap();
        assert_eq!(after.total_gross, Money::ZERO);
    }
}
