use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::employee::Province;
use crate::model::money::Money;

/// How often a pay group closes a period.
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
pub enum PayFrequency {
    Weekly,
    BiWeekly,
    SemiMonthly,
    Monthly,
}

impl PayFrequency {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            PayFrequency::Weekly => 52,
            PayFrequency::BiWeekly => 26,
            PayFrequency::SemiMonthly => 24,
            PayFrequency::Monthly => 12,
        }
    }

    /// Standard worked hours in one period, used to derive an hourly
    /// equivalent for salaried employees (unpaid leave deductions).
    pub fn standard_period_hours(&self) -> Decimal {
        match self {
            PayFrequency::Weekly => dec!(40),
            PayFrequency::BiWeekly => dec!(80),
            PayFrequency::SemiMonthly => dec!(86.67),
            PayFrequency::Monthly => dec!(173.33),
        }
    }

    /// First day of the period that ends on `period_end`. Semi-monthly
    /// periods are 1st–15th and 16th–EOM; monthly periods are calendar
    /// months.
    pub fn period_start(&self, period_end: NaiveDate) -> NaiveDate {
        match self {
            PayFrequency::Weekly => period_end - Days::new(6),
            PayFrequency::BiWeekly => period_end - Days::new(13),
            PayFrequency::SemiMonthly => {
                if period_end.day() <= 15 {
                    period_end.with_day(1).unwrap_or(period_end)
                } else {
                    period_end.with_day(16).unwrap_or(period_end)
                }
            }
            PayFrequency::Monthly => period_end.with_day(1).unwrap_or(period_end),
        }
    }

    /// Period end that follows `period_end`, used to advance a pay group
    /// after a run is approved.
    pub fn next_period_end(&self, period_end: NaiveDate) -> NaiveDate {
        match self {
            PayFrequency::Weekly => period_end + Days::new(7),
            PayFrequency::BiWeekly => period_end + Days::new(14),
            PayFrequency::SemiMonthly => {
                if period_end.day() <= 15 {
                    end_of_month(period_end)
                } else {
                    let first_of_next = end_of_month(period_end) + Days::new(1);
                    first_of_next.with_day(15).unwrap_or(first_of_next)
                }
            }
            PayFrequency::Monthly => end_of_month(end_of_month(period_end) + Days::new(1)),
        }
    }
}

fn end_of_month(date: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .map(|d| d - Days::new(1))
        .unwrap_or(date)
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
pub enum EmploymentType {
    FullTime,
    PartTime,
    Casual,
}

/// Pay-group configuration. Read live by the period resolver and at
/// materialization time only; after that its values live on as record
/// snapshots.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayGroup {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub province: Province,
    pub pay_frequency: PayFrequency,
    pub employment_type: EmploymentType,
    #[schema(value_type = String, format = "date")]
    pub next_period_end: NaiveDate,
    pub overtime_multiplier: Money,
    pub cpp_exempt: bool,
    pub ei_exempt: bool,
    pub cpp2_exempt: bool,
}
