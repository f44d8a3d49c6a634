use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::PayrollError;
use crate::model::money::Money;
use crate::model::record::{LeaveKind, RecordInput, RecordSnapshot};

/// Gross pay components for one employee in one period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrossPay {
    pub regular: Money,
    pub overtime: Money,
    pub holiday: Money,
}

impl GrossPay {
    pub fn total(&self) -> Money {
        self.regular + self.overtime + self.holiday
    }
}

/// Convert a record's compensation basis plus its input payload into gross
/// amounts. Works identically for first materialization and for
/// recalculation of stored input.
///
/// An hourly employee with no regular hours fails the whole batch rather
/// than being silently zeroed.
pub fn gross_for_record(
    employee_id: i64,
    snapshot: &RecordSnapshot,
    input: &RecordInput,
) -> Result<GrossPay, PayrollError> {
    let frequency = snapshot.pay_frequency;
    let ot_multiplier = snapshot.overtime_multiplier.dec();

    let (mut regular, mut overtime, mut holiday) =
        match (snapshot.hourly_rate, snapshot.annual_salary) {
            (Some(rate), None) => {
                let regular_hours = input
                    .regular_hours
                    .ok_or_else(|| PayrollError::MissingHoursInput {
                        employee_id,
                        name: snapshot.employee_name.clone(),
                    })?;
                let rate = rate.dec();

                let paid_leave_hours: Decimal = input
                    .leave_entries
                    .iter()
                    .filter(|e| e.kind == LeaveKind::Paid)
                    .map(|e| e.hours)
                    .sum();
                let regular = (regular_hours + paid_leave_hours) * rate;

                let overtime = input.overtime_hours.unwrap_or(Decimal::ZERO) * rate * ot_multiplier;

                let holiday_hours: Decimal = input
                    .holiday_work_entries
                    .iter()
                    .map(|e| e.hours)
                    .sum();
                let holiday = holiday_hours * rate * ot_multiplier;

                (regular, overtime, holiday)
            }
            (None, Some(salary)) => {
                let period_gross = salary.dec() / Decimal::from(frequency.periods_per_year());

                // Unpaid leave is deducted at the derived hourly equivalent;
                // paid leave is already inside the salary.
                let unpaid_hours: Decimal = input
                    .leave_entries
                    .iter()
                    .filter(|e| e.kind == LeaveKind::Unpaid)
                    .map(|e| e.hours)
                    .sum();
                let hourly_equivalent = period_gross / frequency.standard_period_hours();
                let regular = period_gross - unpaid_hours * hourly_equivalent;

                // Salaried employees earn no overtime or holiday premium
                // unless manually overridden below.
                (regular, dec!(0), dec!(0))
            }
            _ => {
                return Err(PayrollError::InvalidCompensationBasis { employee_id });
            }
        };

    let adjustment_total: Decimal = input.adjustments.iter().map(|a| a.amount.dec()).sum();
    regular += adjustment_total;

    if let Some(v) = input.override_regular_pay {
        regular = v.dec();
    }
    if let Some(v) = input.override_overtime_pay {
        overtime = v.dec();
    }
    if let Some(v) = input.override_holiday_pay {
        holiday = v.dec();
    }

    Ok(GrossPay {
        regular: Money(regular).round_cents(),
        overtime: Money(overtime).round_cents(),
        holiday: Money(holiday).round_cents(),
    })
}
