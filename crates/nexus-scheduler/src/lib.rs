pub mod engine;
pub mod error;
pub mod grammar;
pub mod schedule;

pub use engine::{FiredJob, SchedulerEngine};
pub use error::{Result, SchedulerError};
pub use grammar::parse_when;
pub use schedule::{compute_next_run, Schedule};
