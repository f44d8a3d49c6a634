use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::employee::Province;

/// Statutory holiday reference row. Read-only; not owned by any run.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    pub id: i64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub name: String,
    pub province: Province,
}
