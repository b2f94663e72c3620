use std::{sync::Arc, time::Duration};

use cucumber::World;
use log::*;
use order_sync_engine::{
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        FakeGateway,
        ManualClock,
        RecordingScheduler,
    },
    traits::SyncJob,
    PullSyncApi,
    PushSyncApi,
    RefundApi,
    SqliteDatabase,
    SyncConfig,
    SyncContext,
    WebhookQueueApi,
};
use tokio::time::sleep;

pub type TestContext = SyncContext<SqliteDatabase, FakeGateway, RecordingScheduler>;

#[derive(Default, Debug, World)]
pub struct SyncWorld {
    pub system: Option<SyncSystem>,
}

#[derive(Debug)]
pub struct SyncSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub scheduler: RecordingScheduler,
    pub clock: Arc<ManualClock>,
    pub ctx: TestContext,
}

impl SyncWorld {
    pub fn system(&self) -> &SyncSystem {
        self.system.as_ref().expect("Sync system not initialised")
    }
}

impl SyncSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        sleep(Duration::from_millis(50)).await;
        let gateway = FakeGateway::default();
        let scheduler = RecordingScheduler::default();
        let clock = Arc::new(ManualClock::default());
        // Every pull should see the gateway's latest state
        let config = SyncConfig {
            location_id: "L1".into(),
            inbound_sync: true,
            order_cache_ttl: Duration::ZERO,
            ..Default::default()
        };
        let ctx = SyncContext::new(db.clone(), gateway.clone(), scheduler.clone(), config).with_clock(clock.clone());
        Self { db_path: url, db, gateway, scheduler, clock, ctx }
    }

    pub fn push_api(&self) -> PushSyncApi<SqliteDatabase, FakeGateway, RecordingScheduler> {
        PushSyncApi::new(self.ctx.clone())
    }

    pub fn pull_api(&self) -> PullSyncApi<SqliteDatabase, FakeGateway, RecordingScheduler> {
        PullSyncApi::new(self.ctx.clone())
    }

    pub fn refund_api(&self) -> RefundApi<SqliteDatabase, FakeGateway, RecordingScheduler> {
        RefundApi::new(self.ctx.clone())
    }

    pub fn queue_api(&self) -> WebhookQueueApi<SqliteDatabase, FakeGateway, RecordingScheduler> {
        WebhookQueueApi::new(self.ctx.clone())
    }

    /// Runs everything scheduled so far, regardless of delay. Jobs scheduled while running are left for the next call.
    pub async fn run_scheduled_jobs(&self) {
        let jobs = self.scheduler.take_jobs();
        info!("🚀️ Running {} scheduled jobs", jobs.len());
        for scheduled in jobs {
            let result = match scheduled.job {
                SyncJob::PullOrder { remote_order_id, event } => {
                    self.pull_api().pull(&remote_order_id, &event).await.map(|_| ())
                },
                SyncJob::DrainWebhooks { order_id, retry } => {
                    self.queue_api().drain_and_apply(order_id, retry).await.map(|_| ())
                },
            };
            if let Err(e) = result {
                warn!("🚀️ Scheduled job failed: {e}");
            }
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
