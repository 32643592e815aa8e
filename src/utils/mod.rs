pub mod report;
pub mod setting;
