use sqlx::SqlitePool;

use crate::error::PayrollError;
use crate::model::record::{PayrollRecord, RecordInputPatch};
use crate::model::run::RunStatus;
use crate::payroll::aggregate;

/// Merge a partial edit into a record's draft input and flag it for
/// recalculation. Withholding is NOT recomputed here; that is deferred to
/// `recalc::recalculate`, and the state machine refuses to leave draft
/// while the flag is set.
pub async fn update_record(
    pool: &SqlitePool,
    company_id: i64,
    run_id: i64,
    record_id: i64,
    patch: RecordInputPatch,
) -> Result<PayrollRecord, PayrollError> {
    let run = aggregate::load_run(pool, company_id, run_id).await?;
    if run.status != RunStatus::Draft {
        return Err(PayrollError::RunNotEditable { status: run.status });
    }

    let record = sqlx::query_as::<_, PayrollRecord>(
        "SELECT * FROM payroll_records WHERE id = ? AND payroll_run_id = ?",
    )
    .bind(record_id)
    .bind(run_id)
    .fetch_optional(pool)
    .await?
    .ok_or(PayrollError::NotFound("payroll record"))?;

    let mut input = record.input.clone();
    input.apply(patch);
    let input_json = serde_json::to_string(&input)?;

    sqlx::query("UPDATE payroll_records SET input_data = ?, is_modified = 1 WHERE id = ?")
        .bind(&input_json)
        .bind(record_id)
        .execute(pool)
        .await?;

    Ok(PayrollRecord {
        input,
        is_modified: true,
        ..record
    })
}
