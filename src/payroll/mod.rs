//! Payroll run lifecycle: period resolution, gross pay, tax calculation,
//! run materialization, draft edits, recalculation, membership sync,
//! status transitions and aggregation.

pub mod aggregate;
pub mod gross;
pub mod materializer;
pub mod membership;
pub mod mutation;
pub mod paystub;
pub mod period;
pub mod recalc;
pub mod status;
pub mod tax_client;

#[cfg(test)]
pub mod testkit;
