pub mod analyze;
pub mod schedule;
pub mod template;
