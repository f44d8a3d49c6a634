use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::company::CompanyScope;
use crate::config::Config;
use crate::error::PayrollError;
use crate::model::run::{PayrollRun, RunStatus};
use crate::payroll::aggregate::{self, RunWithGroups};
use crate::payroll::materializer::{self, EmployeeHoursInput};
use crate::payroll::membership;
use crate::payroll::paystub::PaystubError;
use crate::payroll::recalc;
use crate::payroll::status::{self, RunEvent};
use crate::payroll::tax_client::TaxEngine;
use crate::utils::holiday_cache::HolidayCache;

#[derive(Deserialize, ToSchema)]
pub struct CreateRun {
    /// Period end to run for. Omit to run the company's next upcoming
    /// period end.
    #[schema(example = "2026-03-14", format = "date", value_type = Option<String>)]
    pub period_end: Option<NaiveDate>,
    /// Submitted hours for hourly employees.
    #[serde(default)]
    pub hours: Vec<EmployeeHoursInput>,
}

#[derive(Serialize, ToSchema)]
pub struct CreateRunResponse {
    /// False when an existing run for the period was returned instead.
    pub created: bool,
    #[schema(inline)]
    pub run: RunWithGroups,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct RunFilter {
    #[schema(example = "draft")]
    /// Filter by run status
    pub status: Option<RunStatus>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct RunListResponse {
    pub data: Vec<PayrollRun>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct TransitionResponse {
    #[schema(example = "Payroll run submitted for approval")]
    pub message: String,
    pub status: RunStatus,
    /// Per-employee paystub failures on approval; empty otherwise.
    pub paystub_errors: Vec<PaystubError>,
    pub run: PayrollRun,
}

#[derive(Serialize, ToSchema)]
pub struct SyncResponse {
    /// Employee ids that gained a record.
    pub added: Vec<i64>,
    /// Employee ids whose record was removed.
    pub removed: Vec<i64>,
    pub run: PayrollRun,
}

/* =========================
Create (or fetch) a payroll run
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs",
    request_body(
        content = CreateRun,
        description = "Run creation payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Run materialized", body = CreateRunResponse),
        (status = 200, description = "Existing run for the period returned", body = CreateRunResponse),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Validation failed", body = Object, example = json!({
            "message": "employee 7 (Briar Lane) is hourly but no hours were supplied"
        })),
        (status = 502, description = "Tax engine unavailable")
    ),
    tag = "Payroll Runs"
)]
pub async fn create_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    tax: web::Data<dyn TaxEngine>,
    holidays: web::Data<HolidayCache>,
    config: web::Data<Config>,
    payload: web::Json<CreateRun>,
) -> Result<impl Responder, PayrollError> {
    let materialized = materializer::create_or_get(
        &pool,
        tax.get_ref(),
        &holidays,
        config.pay_date_offset_days,
        scope.company_id,
        payload.period_end,
        &payload.hours,
    )
    .await?;

    let run =
        aggregate::load_run_with_groups(&pool, &holidays, scope.company_id, materialized.run_id)
            .await?;
    let body = CreateRunResponse {
        created: materialized.created,
        run,
    };
    Ok(if materialized.created {
        HttpResponse::Created().json(body)
    } else {
        HttpResponse::Ok().json(body)
    })
}

/* =========================
List payroll runs
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/payroll-runs",
    params(RunFilter),
    responses(
        (status = 200, description = "Paginated run list", body = RunListResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Payroll Runs"
)]
pub async fn list_runs(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    query: web::Query<RunFilter>,
) -> Result<impl Responder, PayrollError> {
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE company_id = ?");
    if query.status.is_some() {
        where_sql.push_str(" AND status = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM payroll_runs{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql).bind(scope.company_id);
    if let Some(status) = query.status {
        count_q = count_q.bind(status);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT id, company_id, period_start, period_end, pay_date, status,
               total_gross, total_cpp_employee, total_cpp_employer,
               total_ei_employee, total_ei_employer,
               total_federal_tax, total_provincial_tax,
               total_net_pay, total_employer_cost, created_at
        FROM payroll_runs
        {}
        ORDER BY period_end DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, PayrollRun>(&data_sql).bind(scope.company_id);
    if let Some(status) = query.status {
        data_q = data_q.bind(status);
    }
    let runs = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(RunListResponse {
        data: runs,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/* =========================
Fetch one run with groups and records
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/payroll-runs/{run_id}",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run")
    ),
    responses(
        (status = 200, description = "Run found", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found", body = Object, example = json!({
            "message": "payroll run not found"
        }))
    ),
    tag = "Payroll Runs"
)]
pub async fn get_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    holidays: web::Data<HolidayCache>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    let run =
        aggregate::load_run_with_groups(&pool, &holidays, scope.company_id, path.into_inner())
            .await?;
    Ok(HttpResponse::Ok().json(run))
}

/* =========================
Delete a draft run
========================= */
#[utoipa::path(
    delete,
    path = "/api/v1/payroll-runs/{run_id}",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run to delete")
    ),
    responses(
        (status = 200, description = "Run deleted", body = Object, example = json!({
            "message": "Payroll run deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Run is not a draft")
    ),
    tag = "Payroll Runs"
)]
pub async fn delete_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    let run_id = path.into_inner();
    let run = aggregate::load_run(&pool, scope.company_id, run_id).await?;
    if run.status != RunStatus::Draft {
        return Err(PayrollError::RunNotEditable { status: run.status });
    }

    sqlx::query("DELETE FROM paystub_documents WHERE payroll_run_id = ?")
        .bind(run_id)
        .execute(pool.get_ref())
        .await?;
    sqlx::query("DELETE FROM payroll_records WHERE payroll_run_id = ?")
        .bind(run_id)
        .execute(pool.get_ref())
        .await?;
    sqlx::query("DELETE FROM payroll_runs WHERE id = ?")
        .bind(run_id)
        .execute(pool.get_ref())
        .await?;

    tracing::info!(run_id, "Payroll run deleted");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll run deleted"
    })))
}

/* =========================
Recalculate a draft run
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/recalculate",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run to recalculate")
    ),
    responses(
        (status = 200, description = "Run recalculated", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Run is not a draft"),
        (status = 502, description = "Tax engine unavailable")
    ),
    tag = "Payroll Runs"
)]
pub async fn recalculate_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    tax: web::Data<dyn TaxEngine>,
    holidays: web::Data<HolidayCache>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    let run_id = path.into_inner();
    recalc::recalculate(&pool, tax.get_ref(), scope.company_id, run_id).await?;
    let run = aggregate::load_run_with_groups(&pool, &holidays, scope.company_id, run_id).await?;
    Ok(HttpResponse::Ok().json(run))
}

/* =========================
Membership synchronization
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/sync-membership",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run to reconcile")
    ),
    responses(
        (status = 200, description = "Membership reconciled", body = SyncResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Run is not a draft")
    ),
    tag = "Payroll Runs"
)]
pub async fn sync_membership(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    let run_id = path.into_inner();
    let outcome = membership::sync_membership(&pool, scope.company_id, run_id).await?;
    let run = aggregate::load_run(&pool, scope.company_id, run_id).await?;
    Ok(HttpResponse::Ok().json(SyncResponse {
        added: outcome.added,
        removed: outcome.removed,
        run,
    }))
}

async fn transition(
    pool: &SqlitePool,
    company_id: i64,
    run_id: i64,
    event: RunEvent,
    message: &str,
) -> Result<HttpResponse, PayrollError> {
    let outcome = status::apply_event(pool, company_id, run_id, event).await?;
    let run = aggregate::load_run(pool, company_id, run_id).await?;
    Ok(HttpResponse::Ok().json(TransitionResponse {
        message: message.to_string(),
        status: outcome.status,
        paystub_errors: outcome.paystub_errors,
        run,
    }))
}

/* =========================
Status transitions
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/submit",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run to submit")
    ),
    responses(
        (status = 200, description = "Run submitted for approval", body = TransitionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Invalid transition or recalculation pending", body = Object, example = json!({
            "message": "run has modified records awaiting recalculation"
        }))
    ),
    tag = "Payroll Runs"
)]
pub async fn submit_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    transition(
        &pool,
        scope.company_id,
        path.into_inner(),
        RunEvent::Submit,
        "Payroll run submitted for approval",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/approve",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run to approve")
    ),
    responses(
        (status = 200, description = "Run approved, paystubs generated, pay groups advanced", body = TransitionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Invalid transition")
    ),
    tag = "Payroll Runs"
)]
pub async fn approve_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    transition(
        &pool,
        scope.company_id,
        path.into_inner(),
        RunEvent::Approve,
        "Payroll run approved",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/cancel",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run to cancel")
    ),
    responses(
        (status = 200, description = "Run cancelled", body = TransitionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Invalid transition")
    ),
    tag = "Payroll Runs"
)]
pub async fn cancel_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    transition(
        &pool,
        scope.company_id,
        path.into_inner(),
        RunEvent::Cancel,
        "Payroll run cancelled",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/v1/payroll-runs/{run_id}/revert",
    params(
        ("run_id" = i64, Path, description = "ID of the payroll run to revert to draft")
    ),
    responses(
        (status = 200, description = "Run reverted to draft", body = TransitionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Run not found"),
        (status = 409, description = "Invalid transition")
    ),
    tag = "Payroll Runs"
)]
pub async fn revert_run(
    scope: CompanyScope,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, PayrollError> {
    transition(
        &pool,
        scope.company_id,
        path.into_inner(),
        RunEvent::Revert,
        "Payroll run reverted to draft",
    )
    .await
}
