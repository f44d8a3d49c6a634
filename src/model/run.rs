use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::money::Money;

/// Lifecycle status of a payroll run. Transitions are owned by
/// `payroll::status`; nothing else writes this column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum_macros::Display,
    strum_macros::EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Draft,
    PendingApproval,
    Approved,
    Cancelled,
}

/// Persisted run header. The `total_*` columns are a denormalized read
/// optimization; the authoritative figures are always re-summed from the
/// record set by the aggregator.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollRun {
    pub id: i64,
    pub company_id: i64,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub pay_date: NaiveDate,
    pub status: RunStatus,
    pub total_gross: Money,
    pub total_cpp_employee: Money,
    pub total_cpp_employer: Money,
    pub total_ei_employee: Money,
    pub total_ei_employer: Money,
    pub total_federal_tax: Money,
    pub total_provincial_tax: Money,
    pub total_net_pay: Money,
    pub total_employer_cost: Money,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Option<NaiveDateTime>,
}
