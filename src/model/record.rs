use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use utoipa::ToSchema;

use crate::model::employee::{Employee, Province};
use crate::model::money::Money;
use crate::model::pay_group::{PayFrequency, PayGroup};

/// Employee and pay-group attributes frozen into a record when the run is
/// materialized. This struct is deliberately distinct from `Employee` and
/// `PayGroup`: once captured it is never overwritten from live rows, no
/// matter how the roster or configuration changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecordSnapshot {
    pub employee_name: String,
    pub province: Province,
    pub annual_salary: Option<Money>,
    pub hourly_rate: Option<Money>,
    pub pay_group_id: i64,
    pub pay_group_name: String,
    pub pay_group_province: Province,
    pub pay_frequency: PayFrequency,
    pub federal_claim_amount: Money,
    pub provincial_claim_amount: Money,
    pub cpp_exempt: bool,
    pub ei_exempt: bool,
    pub cpp2_exempt: bool,
    pub overtime_multiplier: Money,
}

impl RecordSnapshot {
    /// Capture the point-in-time state of an employee and their pay group.
    pub fn capture(employee: &Employee, group: &PayGroup) -> RecordSnapshot {
        RecordSnapshot {
            employee_name: employee.full_name(),
            province: employee.province,
            annual_salary: employee.annual_salary,
            hourly_rate: employee.hourly_rate,
            pay_group_id: group.id,
            pay_group_name: group.name.clone(),
            pay_group_province: group.province,
            pay_frequency: group.pay_frequency,
            federal_claim_amount: employee.federal_claim_amount,
            provincial_claim_amount: employee.provincial_claim_amount,
            cpp_exempt: group.cpp_exempt,
            ei_exempt: group.ei_exempt,
            cpp2_exempt: group.cpp2_exempt,
            overtime_multiplier: group.overtime_multiplier,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveKind {
    Paid,
    Unpaid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaveEntry {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = f64, example = 8.0)]
    pub hours: Decimal,
    pub kind: LeaveKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HolidayWorkEntry {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = f64, example = 8.0)]
    pub hours: Decimal,
}

/// Flat dollar adjustment (bonus, retro pay, garnishment as a negative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Adjustment {
    pub label: String,
    pub amount: Money,
}

/// The draft-editable payload of a record, persisted as JSON in
/// `payroll_records.input_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RecordInput {
    #[schema(value_type = f64, example = 80.0)]
    pub regular_hours: Option<Decimal>,
    #[schema(value_type = f64, example = 4.5)]
    pub overtime_hours: Option<Decimal>,
    pub leave_entries: Vec<LeaveEntry>,
    pub holiday_work_entries: Vec<HolidayWorkEntry>,
    pub adjustments: Vec<Adjustment>,
    pub override_regular_pay: Option<Money>,
    pub override_overtime_pay: Option<Money>,
    pub override_holiday_pay: Option<Money>,
}

/// Partial edit to a record's input. Present fields replace the stored
/// value wholesale (lists included); absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RecordInputPatch {
    #[schema(value_type = f64, example = 80.0)]
    pub regular_hours: Option<Decimal>,
    #[schema(value_type = f64, example = 4.5)]
    pub overtime_hours: Option<Decimal>,
    pub leave_entries: Option<Vec<LeaveEntry>>,
    pub holiday_work_entries: Option<Vec<HolidayWorkEntry>>,
    pub adjustments: Option<Vec<Adjustment>>,
    pub override_regular_pay: Option<Money>,
    pub override_overtime_pay: Option<Money>,
    pub override_holiday_pay: Option<Money>,
}

impl RecordInput {
    pub fn apply(&mut self, patch: RecordInputPatch) {
        if let Some(v) = patch.regular_hours {
            self.regular_hours = Some(v);
        }
        if let Some(v) = patch.overtime_hours {
            self.overtime_hours = Some(v);
        }
        if let Some(v) = patch.leave_entries {
            self.leave_entries = v;
        }
        if let Some(v) = patch.holiday_work_entries {
            self.holiday_work_entries = v;
        }
        if let Some(v) = patch.adjustments {
            self.adjustments = v;
        }
        if let Some(v) = patch.override_regular_pay {
            self.override_regular_pay = Some(v);
        }
        if let Some(v) = patch.override_overtime_pay {
            self.override_overtime_pay = Some(v);
        }
        if let Some(v) = patch.override_holiday_pay {
            self.override_holiday_pay = Some(v);
        }
    }
}

/// Withholding and employer-cost figures written back from the tax engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComputedFigures {
    pub gross_regular: Money,
    pub gross_overtime: Money,
    pub gross_holiday: Money,
    pub cpp_base: Money,
    pub cpp_additional: Money,
    pub ei_employee: Money,
    pub federal_tax: Money,
    pub provincial_tax: Money,
    pub cpp_employer: Money,
    pub ei_employer: Money,
    pub net_pay: Money,
    pub employer_cost: Money,
    pub new_ytd_gross: Money,
    pub new_ytd_cpp_base: Money,
    pub new_ytd_cpp_additional: Money,
    pub new_ytd_ei: Money,
}

impl ComputedFigures {
    pub fn gross(&self) -> Money {
        self.gross_regular + self.gross_overtime + self.gross_holiday
    }
}

/// One employee's line in a payroll run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollRecord {
    pub id: i64,
    pub payroll_run_id: i64,
    pub employee_id: i64,
    pub company_id: i64,
    pub snapshot: RecordSnapshot,
    pub input: RecordInput,
    pub is_modified: bool,
    pub computed: ComputedFigures,
}

impl sqlx::FromRow<'_, SqliteRow> for PayrollRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let input_json: String = row.try_get("input_data")?;
        let input: RecordInput =
            serde_json::from_str(&input_json).map_err(|e| sqlx::Error::ColumnDecode {
                index: "input_data".into(),
                source: Box::new(e),
            })?;

        Ok(PayrollRecord {
            id: row.try_get("id")?,
            payroll_run_id: row.try_get("payroll_run_id")?,
            employee_id: row.try_get("employee_id")?,
            company_id: row.try_get("company_id")?,
            snapshot: RecordSnapshot {
                employee_name: row.try_get("employee_name_snapshot")?,
                province: row.try_get("province_snapshot")?,
                annual_salary: row.try_get("annual_salary_snapshot")?,
                hourly_rate: row.try_get("hourly_rate_snapshot")?,
                pay_group_id: row.try_get("pay_group_id_snapshot")?,
                pay_group_name: row.try_get("pay_group_name_snapshot")?,
                pay_group_province: row.try_get("pay_group_province_snapshot")?,
                pay_frequency: row.try_get("pay_frequency_snapshot")?,
                federal_claim_amount: row.try_get("federal_claim_snapshot")?,
                provincial_claim_amount: row.try_get("provincial_claim_snapshot")?,
                cpp_exempt: row.try_get("cpp_exempt_snapshot")?,
                ei_exempt: row.try_get("ei_exempt_snapshot")?,
                cpp2_exempt: row.try_get("cpp2_exempt_snapshot")?,
                overtime_multiplier: row.try_get("overtime_multiplier_snapshot")?,
            },
            input,
            is_modified: row.try_get("is_modified")?,
            computed: ComputedFigures {
                gross_regular: row.try_get("gross_regular")?,
                gross_overtime: row.try_get("gross_overtime")?,
                gross_holiday: row.try_get("gross_holiday")?,
                cpp_base: row.try_get("cpp_base")?,
                cpp_additional: row.try_get("cpp_additional")?,
                ei_employee: row.try_get("ei_employee")?,
                federal_tax: row.try_get("federal_tax")?,
                provincial_tax: row.try_get("provincial_tax")?,
                cpp_employer: row.try_get("cpp_employer")?,
                ei_employer: row.try_get("ei_employer")?,
                net_pay: row.try_get("net_pay")?,
                employer_cost: row.try_get("employer_cost")?,
                new_ytd_gross: row.try_get("new_ytd_gross")?,
                new_ytd_cpp_base: row.try_get("new_ytd_cpp_base")?,
                new_ytd_cpp_additional: row.try_get("new_ytd_cpp_additional")?,
                new_ytd_ei: row.try_get("new_ytd_ei")?,
            },
        })
    }
}
