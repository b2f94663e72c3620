use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queue for routine verification pulls and webhook drains.
pub const DEFAULT_QUEUE: &str = "order-sync";
/// Queue for work that should jump ahead of routine jobs, such as refund verification.
pub const HIGH_PRIORITY_QUEUE: &str = "order-sync-priority";

/// Deferred work the engine asks the scheduler to run on its behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncJob {
    /// Pull the remote order and map it onto its local counterpart.
    PullOrder { remote_order_id: String, event: Value },
    /// Apply the queued webhooks for a local order. `retry` counts previous attempts.
    DrainWebhooks { order_id: i64, retry: u32 },
}

impl SyncJob {
    pub fn pull<S: Into<String>>(remote_order_id: S, event: Value) -> Self {
        Self::PullOrder { remote_order_id: remote_order_id.into(), event }
    }

    pub fn drain(order_id: i64, retry: u32) -> Self {
        Self::DrainWebhooks { order_id, retry }
    }
}

pub trait Scheduler: Clone {
    /// Run `job` on `queue` once `delay` has elapsed. Scheduling is fire-and-forget.
    fn schedule_once(&self, delay: Duration, queue: &str, job: SyncJob);
}
