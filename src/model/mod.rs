pub mod employee;
pub mod holiday;
pub mod money;
pub mod pay_group;
pub mod record;
pub mod run;
