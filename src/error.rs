use actix_web::{HttpResponse, http::StatusCode};
use chrono::NaiveDate;

use crate::model::run::RunStatus;
use crate::payroll::status::RunEvent;

/// Engine error taxonomy. Validation errors are rejected before any
/// external call or persistence; calculation failures abort the whole
/// operation with nothing committed; state conflicts are guard violations
/// the caller can recover from by choosing a valid action.
#[derive(Debug, thiserror::Error)]
pub enum PayrollError {
    #[error("employee {employee_id} ({name}) is hourly but no hours were supplied")]
    MissingHoursInput { employee_id: i64, name: String },

    #[error(
        "employee {employee_id} has an invalid compensation basis: exactly one of annual salary or hourly rate must be set"
    )]
    InvalidCompensationBasis { employee_id: i64 },

    #[error("no employees to process for period ending {period_end}")]
    NoEmployeesToProcess { period_end: NaiveDate },

    #[error("tax calculation failed: {0}")]
    CalculationFailed(String),

    #[error("run is not editable in status {status}")]
    RunNotEditable { status: RunStatus },

    #[error("cannot {event} a run in status {from}")]
    InvalidTransition { from: RunStatus, event: RunEvent },

    #[error("run has modified records awaiting recalculation")]
    RecalculationRequired,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid record input payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl actix_web::ResponseError for PayrollError {
    fn status_code(&self) -> StatusCode {
        match self {
            PayrollError::MissingHoursInput { .. }
            | PayrollError::InvalidCompensationBasis { .. }
            | PayrollError::NoEmployeesToProcess { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PayrollError::RunNotEditable { .. }
            | PayrollError::InvalidTransition { .. }
            | PayrollError::RecalculationRequired => StatusCode::CONFLICT,
            PayrollError::NotFound(_) => StatusCode::NOT_FOUND,
            PayrollError::CalculationFailed(_) => StatusCode::BAD_GATEWAY,
            PayrollError::Database(_) | PayrollError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let message = match self {
            // Internal details stay in the log, not the response body.
            PayrollError::Database(_) | PayrollError::Serialization(_) => {
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "message": message }))
    }
}
