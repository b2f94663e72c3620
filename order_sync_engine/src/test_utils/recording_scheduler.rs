use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::traits::{Scheduler, SyncJob};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub delay: Duration,
    pub queue: String,
    pub job: SyncJob,
}

/// A [`Scheduler`] that records jobs instead of running them.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    jobs: Arc<Mutex<Vec<ScheduledJob>>>,
}

impl RecordingScheduler {
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    /// Removes and returns everything scheduled so far.
    pub fn take_jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().map(|mut j| std::mem::take(&mut *j)).unwrap_or_default()
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule_once(&self, delay: Duration, queue: &str, job: SyncJob) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(ScheduledJob { delay, queue: queue.to_string(), job });
        }
    }
}
