use std::time::Duration;

use log::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::traits::{Scheduler, SyncJob, DEFAULT_QUEUE, HIGH_PRIORITY_QUEUE};

/// The receiving ends of the scheduler's queues.
pub struct JobReceivers {
    pub priority: UnboundedReceiver<SyncJob>,
    pub default: UnboundedReceiver<SyncJob>,
}

/// Schedules jobs with tokio timers. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    priority: UnboundedSender<SyncJob>,
    default: UnboundedSender<SyncJob>,
}

impl TokioScheduler {
    pub fn new() -> (Self, JobReceivers) {
        let (priority_tx, priority_rx) = unbounded_channel();
        let (default_tx, default_rx) = unbounded_channel();
        let scheduler = Self { priority: priority_tx, default: default_tx };
        (scheduler, JobReceivers { priority: priority_rx, default: default_rx })
    }

    fn sender_for(&self, queue: &str) -> UnboundedSender<SyncJob> {
        match queue {
            HIGH_PRIORITY_QUEUE => self.priority.clone(),
            DEFAULT_QUEUE => self.default.clone(),
            other => {
                warn!("🕰️ Unknown job queue '{other}'. Using {DEFAULT_QUEUE}");
                self.default.clone()
            },
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, queue: &str, job: SyncJob) {
        let tx = self.sender_for(queue);
        trace!("🕰️ Scheduling {job:?} on {queue} in {}s", delay.as_secs());
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = tx.send(job) {
                warn!("🕰️ Job worker has shut down. Dropping {:?}", e.0);
            }
        });
    }
}
