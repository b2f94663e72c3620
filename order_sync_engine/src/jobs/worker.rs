use log::*;

use crate::{
    jobs::JobReceivers,
    sync_api::{PullSyncApi, SyncContext, SyncError, WebhookQueueApi},
    traits::{OrderStore, RemoteClient, Scheduler, SyncJob},
};

/// Runs scheduled pulls and webhook drains.
pub struct SyncJobWorker<S, C, Q> {
    pull: PullSyncApi<S, C, Q>,
    queue: WebhookQueueApi<S, C, Q>,
    receivers: JobReceivers,
}

impl<S, C, Q> SyncJobWorker<S, C, Q>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    pub fn new(ctx: SyncContext<S, C, Q>, receivers: JobReceivers) -> Self {
        let pull = PullSyncApi::new(ctx.clone());
        let queue = WebhookQueueApi::new(ctx);
        Self { pull, queue, receivers }
    }

    /// Waits for the next due job. High-priority jobs are always taken first. Returns `None` once every scheduler
    /// handle has been dropped and both queues are empty.
    pub async fn next_job(&mut self) -> Option<SyncJob> {
        let JobReceivers { priority, default } = &mut self.receivers;
        tokio::select! {
            biased;
            Some(job) = priority.recv() => Some(job),
            Some(job) = default.recv() => Some(job),
            else => None,
        }
    }

    pub async fn run_job(&self, job: SyncJob) -> Result<(), SyncError> {
        match job {
            SyncJob::PullOrder { remote_order_id, event } => {
                debug!("🕰️ Pulling remote order {remote_order_id}");
                self.pull.pull(&remote_order_id, &event).await.map(|_| ())
            },
            SyncJob::DrainWebhooks { order_id, retry } => {
                debug!("🕰️ Draining pending webhooks for order #{order_id} (attempt {retry})");
                self.queue.drain_and_apply(order_id, retry).await.map(|_| ())
            },
        }
    }

    /// Processes jobs until the scheduler is dropped. Errors are logged; the job is not retried here.
    pub async fn run(mut self) {
        info!("🕰️ Order sync job worker started");
        while let Some(job) = self.next_job().await {
            if let Err(e) = self.run_job(job).await {
                error!("🕰️ Sync job failed. {e}");
            }
        }
        info!("🕰️ Order sync job worker stopped");
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use gateway_tools::RemoteOrder;
    use serde_json::json;

    use super::*;
    use crate::{
        db_types::{NewLocalOrder, OrderStatusType},
        jobs::TokioScheduler,
        sync_api::SyncConfig,
        test_utils::{sample_items, FakeGateway, MemoryOrderStore},
        traits::{DEFAULT_QUEUE, HIGH_PRIORITY_QUEUE},
    };

    #[tokio::test]
    async fn priority_jobs_run_first() {
        let _ = env_logger::try_init();
        let (scheduler, receivers) = TokioScheduler::new();
        let store = MemoryOrderStore::default();
        let ctx = SyncContext::new(store, FakeGateway::default(), scheduler.clone(), SyncConfig::default());
        let mut worker = SyncJobWorker::new(ctx, receivers);
        scheduler.schedule_once(Duration::ZERO, DEFAULT_QUEUE, SyncJob::drain(1, 0));
        scheduler.schedule_once(Duration::ZERO, HIGH_PRIORITY_QUEUE, SyncJob::drain(2, 0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(worker.next_job().await, Some(SyncJob::drain(2, 0)));
        assert_eq!(worker.next_job().await, Some(SyncJob::drain(1, 0)));
    }

    #[tokio::test]
    async fn scheduled_pull_updates_the_order() {
        let _ = env_logger::try_init();
        let store = MemoryOrderStore::default();
        let gateway = FakeGateway::default();
        store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(42));
        gateway.insert_order(RemoteOrder {
            id: "R1".into(),
            state: "CANCELED".into(),
            reference_id: Some("42".into()),
            ..Default::default()
        });
        let (scheduler, receivers) = TokioScheduler::new();
        let ctx = SyncContext::new(store.clone(), gateway, scheduler.clone(), SyncConfig::default());
        let mut worker = SyncJobWorker::new(ctx, receivers);
        scheduler.schedule_once(Duration::from_millis(10), DEFAULT_QUEUE, SyncJob::pull("R1", json!({})));
        let job = worker.next_job().await.unwrap();
        worker.run_job(job).await.unwrap();
        assert_eq!(store.fetch_order(42).await.unwrap().unwrap().status, OrderStatusType::Denied);
    }

    #[tokio::test]
    async fn delayed_jobs_wait_for_their_delay() {
        let (scheduler, receivers) = TokioScheduler::new();
        let store = MemoryOrderStore::default();
        let ctx = SyncContext::new(store, FakeGateway::default(), scheduler.clone(), SyncConfig::default());
        let mut worker = SyncJobWorker::new(ctx, receivers);
        scheduler.schedule_once(Duration::from_secs(60), DEFAULT_QUEUE, SyncJob::drain(1, 0));
        let next = tokio::time::timeout(Duration::from_millis(20), worker.next_job()).await;
        assert!(next.is_err());
    }
}
