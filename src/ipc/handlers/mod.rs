pub mod backup_exchange;
pub mod core;
pub mod reports;
pub mod results;
pub mod scores;
pub mod setup;
pub mod students;
pub mod subjects;
