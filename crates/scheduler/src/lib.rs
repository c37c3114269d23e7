pub mod scheduler;

pub use scheduler::{DailyReport, ValidationScheduler};
