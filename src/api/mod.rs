pub mod records;
pub mod runs;
