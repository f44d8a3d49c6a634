use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::money::Money;

/// Province of employment, two-letter code.
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
pub enum Province {
    AB,
    BC,
    MB,
    NB,
    NL,
    NS,
    NT,
    NU,
    ON,
    PE,
    QC,
    SK,
    YT,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum_macros::Display,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    Terminated,
}

/// Roster entity. Live row only: values that matter to a payroll run are
/// copied into a `RecordSnapshot` at materialization time and never read
/// back from here.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Employee {
    pub id: i64,
    pub company_id: i64,
    pub pay_group_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub province: Province,
    /// Salaried basis; mutually exclusive with `hourly_rate`.
    pub annual_salary: Option<Money>,
    /// Hourly basis; mutually exclusive with `annual_salary`.
    pub hourly_rate: Option<Money>,
    pub federal_claim_amount: Money,
    pub provincial_claim_amount: Money,
    pub status: EmployeeStatus,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
