use actix_web::{HttpResponse, Responder, web};
use sqlx::SqlitePool;

use crate::auth::company::CompanyScope;
use crate::error::PayrollError;
use crate::model::record::RecordInputPatch;
use crate::payroll::mutation;

/* =========================
Edit one record's draft input
========================= */
#[utoipa::path(
    patch,
    path = "/api/v1/payroll-runs/{run_id}/records/{record_id}",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run"),
        ("record_id" = i64, Path, description = "ID of the record to edit")
    ),
    request_body(
        content = RecordInputPatch,
        description = "Partial input edit; omitted fields keep their stored value",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Record updated and flagged for recalculation", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run or record not found"),
        (status = 409, description = "Run is not a draft", body = Object, example = json!({
            "message": "run is not editable in status approved"
        }))
    ),
    tag = "Payroll Records"
)]
pub async fn patch_record(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64, i64)>,
    payload: web::Json<RecordInputPatch>,
) -> Result<impl Responder, PayrollError> {
    let (run_id, record_id) = path.into_inner();
    let record = mutation::update_record(
        &pool,
        scope.company_id,
        run_id,
        record_id,
        payload.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}
