use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::PayrollError;
use crate::model::pay_group::PayGroup;
use crate::model::run::RunStatus;
use crate::payroll::paystub::{self, PaystubError};
use crate::payroll::recalc;

/// Lifecycle events a caller can request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumIter,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunEvent {
    Submit,
    Approve,
    Cancel,
    Revert,
}

/// The complete set of legal transitions. Anything not in this table is
/// an `InvalidTransition`.
static TRANSITIONS: Lazy<HashMap<(RunStatus, RunEvent), RunStatus>> = Lazy::new(|| {
    HashMap::from([
        ((RunStatus::Draft, RunEvent::Submit), RunStatus::PendingApproval),
        ((RunStatus::PendingApproval, RunEvent::Approve), RunStatus::Approved),
        ((RunStatus::Draft, RunEvent::Cancel), RunStatus::Cancelled),
        ((RunStatus::PendingApproval, RunEvent::Cancel), RunStatus::Cancelled),
        ((RunStatus::PendingApproval, RunEvent::Revert), RunStatus::Draft),
    ])
});

pub fn target_for(from: RunStatus, event: RunEvent) -> Option<RunStatus> {
    TRANSITIONS.get(&(from, event)).copied()
}

#[derive(Debug)]
pub struct TransitionOutcome {
    pub status: RunStatus,
    /// Employee-level paystub failures on approval. Reported, never
    /// blocking: the approval stands regardless.
    pub paystub_errors: Vec<PaystubError>,
}

/// Validate and execute a status transition with its side effects.
///
/// The write is an optimistic compare-and-set on the status column; if a
/// concurrent caller moved the run first, the actual current status is
/// re-read and reported in the error.
pub async fn apply_event(
    pool: &SqlitePool,
    company_id: i64,
    run_id: i64,
    event: RunEvent,
) -> Result<TransitionOutcome, PayrollError> {
    let run = crate::payroll::aggregate::load_run(pool, company_id, run_id).await?;

    let target = target_for(run.status, event).ok_or(PayrollError::InvalidTransition {
        from: run.status,
        event,
    })?;

    // Unrecalculated edits must not leave draft.
    if event == RunEvent::Submit && recalc::has_modified_records(pool, run_id).await? {
        return Err(PayrollError::RecalculationRequired);
    }

    let updated = sqlx::query("UPDATE payroll_runs SET status = ? WHERE id = ? AND status = ?")
        .bind(target)
        .bind(run_id)
        .bind(run.status)
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        // Lost a race; report the status that actually won.
        let current = crate::payroll::aggregate::load_run(pool, company_id, run_id).await?;
        return Err(PayrollError::InvalidTransition {
            from: current.status,
            event,
        });
    }

    tracing::info!(run_id, from = %run.status, to = %target, "Payroll run transitioned");

    let mut paystub_errors = Vec::new();
    if target == RunStatus::Approved {
        paystub_errors = paystub::generate_for_run(pool, &run).await?;
        advance_pay_groups(pool, company_id, run_id, run.period_end).await?;
    }

    Ok(TransitionOutcome {
        status: target,
        paystub_errors,
    })
}

/// Move every pay group in the approved run to its following period end.
/// Groups already past the run's period end are left alone.
async fn advance_pay_groups(
    pool: &SqlitePool,
    company_id: i64,
    run_id: i64,
    period_end: chrono::NaiveDate,
) -> Result<(), PayrollError> {
    let groups = sqlx::query_as::<_, PayGroup>(
        r#"
        SELECT g.id, g.company_id, g.name, g.province, g.pay_frequency, g.employment_type,
               g.next_period_end, g.overtime_multiplier, g.cpp_exempt, g.ei_exempt, g.cpp2_exempt
        FROM pay_groups g
        WHERE g.company_id = ?
          AND g.id IN (
              SELECT DISTINCT pay_group_id_snapshot FROM payroll_records
              WHERE payroll_run_id = ?
          )
        "#,
    )
    .bind(company_id)
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    for group in groups {
        if group.next_period_end != period_end {
            continue;
        }
        let next = group.pay_frequency.next_period_end(period_end);
        sqlx::query("UPDATE pay_groups SET next_period_end = ? WHERE id = ?")
            .bind(next)
            .bind(group.id)
            .execute(pool)
            .await?;
        tracing::info!(pay_group_id = group.id, %next, "Advanced pay group period");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::model::record::RecordInputPatch;
    use crate::payroll::materializer::create_or_get;
    use crate::payroll::mutation::update_record;
    use crate::payroll::testkit::{self, MockTaxEngine};
    use crate::utils::holiday_cache::HolidayCache;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    #[test]
    fn transition_table_is_exactly_the_legal_edges() {
        let legal = [
            (RunStatus::Draft, RunEvent::Submit, RunStatus::PendingApproval),
            (RunStatus::PendingApproval, RunEvent::Approve, RunStatus::Approved),
            (RunStatus::Draft, RunEvent::Cancel, RunStatus::Cancelled),
            (RunStatus::PendingApproval, RunEvent::Cancel, RunStatus::Cancelled),
            (RunStatus::PendingApproval, RunEvent::Revert, RunStatus::Draft),
        ];
        let statuses = [
            RunStatus::Draft,
            RunStatus::PendingApproval,
            RunStatus::Approved,
            RunStatus::Cancelled,
        ];
        for from in statuses {
            for event in RunEvent::iter() {
                let expected = legal
                    .iter()
                    .find(|(f, e, _)| *f == from && *e == event)
                    .map(|(_, _, to)| *to);
                assert_eq!(target_for(from, event), expected, "{from} + {event}");
            }
        }
    }

    async fn seeded_run(pool: &SqlitePool) -> (i64, i64, i64, i64) {
        let cache = HolidayCache::new();
        let company = testkit::seed_company(pool).await;
        let group = testkit::seed_biweekly_group(pool, company, "2026-03-14").await;
        let employee = testkit::seed_salaried(pool, company, group, "Avery", "Holt", "78000").await;
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
        (company, group, employee, run.run_id)
    }

    async fn record_id(pool: &SqlitePool, run_id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT id FROM payroll_records WHERE payroll_run_id = ?")
            .bind(run_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn submit_blocked_until_recalculated() {
        let pool = test_pool().await;
        let (company, _, _, run_id) = seeded_run(&pool).await;
        let record = record_id(&pool, run_id).await;

        update_record(
            &pool,
            company,
            run_id,
            record,
            RecordInputPatch {
                overtime_hours: Some(dec!(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = apply_event(&pool, company, run_id, RunEvent::Submit)
            .await
            .unwrap_err();
        assert!(matches!(err, PayrollError::RecalculationRequired));

        crate::payroll::recalc::recalculate(&pool, &MockTaxEngine, company, run_id)
            .await
            .unwrap();
        let outcome = apply_event(&pool, company, run_id, RunEvent::Submit)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::PendingApproval);
    }

    #[actix_web::test]
    async fn approval_generates_paystubs_and_advances_pay_group() {
        let pool = test_pool().await;
        let (company, group, _, run_id) = seeded_run(&pool).await;

        apply_event(&pool, company, run_id, RunEvent::Submit)
            .await
            .unwrap();
        let outcome = apply_event(&pool, company, run_id, RunEvent::Approve)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Approved);
        assert!(outcome.paystub_errors.is_empty());

        let stubs = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM paystub_documents WHERE payroll_run_id = ?",
        )
        .bind(run_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(stubs, 1);

        let next = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT next_period_end FROM pay_groups WHERE id = ?",
        )
        .bind(group)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(next, "2026-03-28".parse::<NaiveDate>().unwrap());
    }

    #[actix_web::test]
    async fn paystub_failure_reports_but_does_not_block_approval() {
        let pool = test_pool().await;
        let (company, _, _, run_id) = seeded_run(&pool).await;
        let record = record_id(&pool, run_id).await;

        // Corrupt one record's stored input so rendering fails.
        sqlx::query("UPDATE payroll_records SET input_data = 'not json' WHERE id = ?")
            .bind(record)
            .execute(&pool)
            .await
            .unwrap();

        apply_event(&pool, company, run_id, RunEvent::Submit)
            .await
            .unwrap();
        let outcome = apply_event(&pool, company, run_id, RunEvent::Approve)
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Approved);
        assert_eq!(outcome.paystub_errors.len(), 1);

        let status = sqlx::query_scalar::<_, RunStatus>(
            "SELECT status FROM payroll_runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, RunStatus::Approved);
    }

    #[actix_web::test]
    async fn revert_from_approved_names_actual_status() {
        let pool = test_pool().await;
        let (company, _, _, run_id) = seeded_run(&pool).await;

        apply_event(&pool, company, run_id, RunEvent::Submit)
            .await
            .unwrap();
        apply_event(&pool, company, run_id, RunEvent::Approve)
            .await
            .unwrap();

        let err = apply_event(&pool, company, run_id, RunEvent::Revert)
            .await
            .unwrap_err();
        match err {
            PayrollError::InvalidTransition { from, event } => {
                assert_eq!(from, RunStatus::Approved);
                assert_eq!(event, RunEvent::Revert);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[actix_web::test]
    async fn revert_returns_pending_run_to_draft() {
        let pool = test_pool().await;
        let (company, _, _, run_id) = seeded_run(&pool).await;

        apply_event(&pool, company, run_id, RunEvent::Submit)
            .await
            .unwrap();
        let outcome = apply_event(&pool, company, run_id, RunEvent::Revert)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Draft);
    }

    #[actix_web::test]
    async fn cancel_has_no_side_effects() {
        let pool = test_pool().await;
        let (company, group, _, run_id) = seeded_run(&pool).await;

        let outcome = apply_event(&pool, company, run_id, RunEvent::Cancel)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Cancelled);

        let next = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT next_period_end FROM pay_groups WHERE id = ?",
        )
        .bind(group)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(next, "2026-03-14".parse::<NaiveDate>().unwrap());

        let stubs = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM paystub_documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stubs, 0);
    }
}
