use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{CronmeshError, Result};
use crate::scheduler::job::Job;

/// A registered schedule for one job
#[derive(Debug, Clone)]
pub struct Entry {
    pub job_name: String,
    pub interval: Duration,
    /// Absolute next fire time
    pub next: DateTime<Utc>,
}

/// In-process cron registry.
///
/// Holds one entry per scheduled job, keyed by job name. The trigger
/// loop pops due entries; the dispatcher reads `next` through
/// [`Scheduler::get_entry`] to refresh the persisted job before any
/// broadcast.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or refresh the entry for a job. Child jobs have no
    /// independent schedule and are rejected.
    pub async fn schedule(&self, job: &Job) -> Result<()> {
        if job.is_child() {
            return Err(CronmeshError::BadSchedule(
                job.schedule.clone(),
                format!("child job {} has no independent schedule", job.name),
            ));
        }
        let interval = parse_interval(&job.schedule)?;
        let next = Utc::now()
            + chrono::Duration::from_std(interval)
                .map_err(|e| CronmeshError::BadSchedule(job.schedule.clone(), e.to_string()))?;

        let mut entries = self.entries.write().await;
        entries.insert(
            job.name.clone(),
            Entry {
                job_name: job.name.clone(),
                interval,
                next,
            },
        );
        tracing::debug!(job = %job.name, next = %next, "Scheduled job");
        Ok(())
    }

    pub async fn remove(&self, job_name: &str) {
        self.entries.write().await.remove(job_name);
    }

    /// Entry for a named job, if one is registered
    pub async fn get_entry(&self, job_name: &str) -> Option<Entry> {
        self.entries.read().await.get(job_name).cloned()
    }

    /// Entries due at `now`. Each returned entry has already been
    /// advanced past `now`, so `get_entry` observes the upcoming fire
    /// time while the returned copy carries the one that fired.
    pub async fn advance_due(&self, now: DateTime<Utc>) -> Vec<Entry> {
        let mut due = Vec::new();
        let mut entries = self.entries.write().await;
        for entry in entries.values_mut() {
            if entry.next <= now {
                due.push(entry.clone());
                let step = chrono::Duration::from_std(entry.interval)
                    .unwrap_or_else(|_| chrono::Duration::seconds(1));
                while entry.next <= now {
                    entry.next += step;
                }
            }
        }
        due
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Parse an interval schedule like "30s", "5m", "2h" or "1d"
pub fn parse_interval(schedule: &str) -> Result<Duration> {
    let schedule = schedule.trim();
    let split = schedule
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| {
            CronmeshError::BadSchedule(schedule.to_string(), "missing unit suffix".to_string())
        })?;
    let (digits, unit) = schedule.split_at(split);
    let value: u64 = digits.parse().map_err(|_| {
        CronmeshError::BadSchedule(schedule.to_string(), "missing interval value".to_string())
    })?;
    if value == 0 {
        return Err(CronmeshError::BadSchedule(
            schedule.to_string(),
            "interval must be positive".to_string(),
        ));
    }

    let seconds = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        "d" => value * 86_400,
        other => {
            return Err(CronmeshError::BadSchedule(
                schedule.to_string(),
                format!("unknown unit '{}'", other),
            ))
        }
    };
    Ok(Duration::from_secs(seconds))
}
