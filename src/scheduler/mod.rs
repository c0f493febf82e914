pub mod cron;
pub mod job;

pub use cron::{parse_interval, Entry, Scheduler};
pub use job::{Execution, Job};
