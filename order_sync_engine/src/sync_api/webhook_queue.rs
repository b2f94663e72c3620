//! Deferred status transitions.
//!
//! Webhooks that arrive while an order is inside its checkout-hold window are parked here and applied once the hold
//! has passed. Each entry records the status the order must still have when it is applied, so a stale entry can never
//! overwrite a newer transition.
use std::{fmt::Debug, time::Duration};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{OrderStatusType, PendingWebhook},
    events::{OrderStatusChangedEvent, WebhookRetriesExhaustedEvent},
    helpers::{add_duration, duration_until},
    sync_api::{context::SyncContext, errors::SyncError},
    traits::{OrderStore, OrderStoreError, RemoteClient, Scheduler, SyncJob, DEFAULT_QUEUE},
};

pub struct WebhookQueueApi<S, C, Q> {
    ctx: SyncContext<S, C, Q>,
}

impl<S, C, Q> Debug for WebhookQueueApi<S, C, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookQueueApi")
    }
}

impl<S, C, Q> WebhookQueueApi<S, C, Q> {
    pub fn new(ctx: SyncContext<S, C, Q>) -> Self {
        Self { ctx }
    }
}

impl<S, C, Q> WebhookQueueApi<S, C, Q>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    pub async fn enqueue(&self, order_id: i64, entry: PendingWebhook) -> Result<(), SyncError> {
        debug!(
            "📨️ Queueing {} -> {} for order #{order_id} until its checkout hold expires",
            entry.old_status, entry.new_status
        );
        self.ctx.store.enqueue_webhook(order_id, &entry).await?;
        Ok(())
    }

    /// Schedules a drain for `hold_backoff` after the hold window ends.
    pub fn schedule_after_hold(&self, order_id: i64, hold_until: DateTime<Utc>, retry: u32) {
        let at = add_duration(hold_until, self.ctx.config.hold_backoff);
        let delay = duration_until(self.ctx.clock.now(), at);
        self.schedule_drain(order_id, retry, delay);
    }

    fn schedule_drain(&self, order_id: i64, retry: u32, delay: Duration) {
        trace!("📨️ Drain #{retry} for order #{order_id} scheduled in {}s", delay.as_secs());
        self.ctx.scheduler.schedule_once(delay, DEFAULT_QUEUE, SyncJob::drain(order_id, retry));
    }

    /// Applies the queued transitions for an order, oldest first.
    ///
    /// Entries whose target equals the current status are skipped. Entries whose expected status no longer matches
    /// are dropped. If the order is still on hold, or storage fails transiently, the drain is rescheduled with
    /// `retry + 1` until `max_webhook_retries` is exceeded. Returns the number of transitions applied.
    pub async fn drain_and_apply(&self, order_id: i64, retry: u32) -> Result<usize, SyncError> {
        let max_retries = self.ctx.config.max_webhook_retries;
        if retry > max_retries {
            error!(
                "📨️ Giving up on pending webhooks for order #{order_id} after {retry} attempts. Manual intervention is \
                 required."
            );
            let event = WebhookRetriesExhaustedEvent { order_id, retries: retry, at: self.ctx.clock.now() };
            self.ctx.producers.publish_retries_exhausted(event).await;
            return Err(SyncError::WebhookRetriesExhausted { order_id, retries: retry });
        }
        let order = match self.ctx.store.fetch_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return Err(SyncError::OrderNotFound(order_id)),
            Err(e) => return Err(self.backoff(order_id, retry, e)),
        };
        let now = self.ctx.clock.now();
        if let Some(hold_until) = order.on_checkout_hold_until.filter(|_| order.is_on_hold(now)) {
            debug!("📨️ Order #{order_id} is still on checkout hold. Trying again later.");
            self.schedule_after_hold(order_id, hold_until, retry + 1);
            return Ok(0);
        }
        let entries = match self.ctx.store.take_pending_webhooks(order_id).await {
            Ok(entries) => entries,
            Err(e) => return Err(self.backoff(order_id, retry, e)),
        };
        trace!("📨️ {} pending webhooks for order #{order_id}", entries.len());
        let mut current = order.status;
        let mut applied = 0;
        let mut remaining = entries.into_iter();
        while let Some(entry) = remaining.next() {
            if entry.new_status == current {
                trace!("📨️ Order #{order_id} is already {current}. Skipping entry.");
                continue;
            }
            if entry.old_status != current {
                warn!(
                    "📨️ Dropping stale transition {} -> {} for order #{order_id}, which is now {current}",
                    entry.old_status, entry.new_status
                );
                continue;
            }
            match self.ctx.store.compare_and_set_status(order_id, current, entry.new_status, &entry.linkage).await {
                Ok(true) => {
                    info!("📨️ Order #{order_id} moved from {current} to {}", entry.new_status);
                    self.publish_change(order_id, current, entry.new_status, entry.linkage.gateway_order_id.clone())
                        .await;
                    current = entry.new_status;
                    applied += 1;
                },
                Ok(false) => match self.ctx.store.fetch_order(order_id).await {
                    Ok(order) => {
                        current = order.map(|o| o.status).unwrap_or(current);
                        warn!("📨️ Order #{order_id} changed status concurrently to {current}. Dropping entry.");
                    },
                    Err(e) => {
                        // the current status is unknown, so the conflicting entry is kept for the next drain to judge
                        let unapplied = std::iter::once(entry).chain(remaining).collect::<Vec<_>>();
                        self.requeue(order_id, &unapplied).await;
                        return Err(self.backoff(order_id, retry, e));
                    },
                },
                Err(e) => {
                    let unapplied = std::iter::once(entry).chain(remaining).collect::<Vec<_>>();
                    self.requeue(order_id, &unapplied).await;
                    return Err(self.backoff(order_id, retry, e));
                },
            }
        }
        Ok(applied)
    }

    async fn publish_change(&self, order_id: i64, old: OrderStatusType, new: OrderStatusType, gid: Option<String>) {
        let event = OrderStatusChangedEvent::new(order_id, old, new).with_gateway_order_id(gid);
        self.ctx.producers.publish_status_changed(event).await;
    }

    async fn requeue(&self, order_id: i64, entries: &[PendingWebhook]) {
        for entry in entries {
            if let Err(e) = self.ctx.store.enqueue_webhook(order_id, entry).await {
                error!("📨️ Could not requeue webhook for order #{order_id}. It has been lost. {e}. {entry:?}");
            }
        }
    }

    fn backoff(&self, order_id: i64, retry: u32, e: OrderStoreError) -> SyncError {
        if e.is_transient() {
            warn!("📨️ Storage error draining webhooks for order #{order_id}. Retrying. {e}");
            self.schedule_drain(order_id, retry + 1, self.ctx.config.retry_backoff);
        } else {
            error!("📨️ Could not drain webhooks for order #{order_id}. {e}");
        }
        SyncError::StoreError(e)
    }
}

#[cfg(test)]
mod test {
    use std::{
        future::Future,
        pin::Pin,
        sync::{Arc, Mutex},
    };

    use serde_json::json;

    use super::*;
    use crate::{
        db_types::{GatewayLinkage, NewLocalOrder},
        events::{EventHandler, EventProducers, Handler},
        sync_api::SyncConfig,
        test_utils::{sample_items, FakeGateway, ManualClock, MemoryOrderStore, RecordingScheduler},
    };

    type Api = WebhookQueueApi<MemoryOrderStore, FakeGateway, RecordingScheduler>;

    fn setup() -> (Api, MemoryOrderStore, RecordingScheduler, Arc<ManualClock>) {
        let _ = env_logger::try_init();
        let store = MemoryOrderStore::default();
        let scheduler = RecordingScheduler::default();
        let clock = Arc::new(ManualClock::default());
        let ctx = SyncContext::new(store.clone(), FakeGateway::default(), scheduler.clone(), SyncConfig::default())
            .with_clock(clock.clone());
        (WebhookQueueApi::new(ctx), store, scheduler, clock)
    }

    fn entry(old: OrderStatusType, new: OrderStatusType, at: DateTime<Utc>) -> PendingWebhook {
        PendingWebhook {
            new_status: new,
            old_status: old,
            metadata: json!({"type": "order.updated"}),
            linkage: GatewayLinkage::default(),
            enqueued_at: at,
        }
    }

    #[tokio::test]
    async fn applies_entries_in_order() {
        let (api, store, _, clock) = setup();
        let now = clock.now();
        let order = store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(5));
        api.enqueue(5, entry(OrderStatusType::Pending, OrderStatusType::Completed, now)).await.unwrap();
        // duplicate delivery of the same transition
        api.enqueue(5, entry(OrderStatusType::Pending, OrderStatusType::Completed, now)).await.unwrap();
        // stale: expects Pending but the order will be Completed by then
        api.enqueue(5, entry(OrderStatusType::Pending, OrderStatusType::Denied, now)).await.unwrap();
        api.enqueue(5, entry(OrderStatusType::Completed, OrderStatusType::Refunded, now)).await.unwrap();
        assert_eq!(order.status, OrderStatusType::Pending);

        let applied = api.drain_and_apply(5, 0).await.unwrap();
        assert_eq!(applied, 2);
        let order = store.fetch_order(5).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Refunded);
        assert!(store.take_pending_webhooks(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reschedules_while_on_hold() {
        let (api, store, scheduler, clock) = setup();
        let hold_until = clock.now() + chrono::Duration::minutes(5);
        store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(6).with_hold_until(hold_until));
        api.enqueue(6, entry(OrderStatusType::Pending, OrderStatusType::Completed, clock.now())).await.unwrap();
        assert_eq!(api.drain_and_apply(6, 2).await.unwrap(), 0);
        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job, SyncJob::drain(6, 3));
        assert_eq!(jobs[0].delay, Duration::from_secs(6 * 60));
        assert_eq!(store.fetch_order(6).await.unwrap().unwrap().status, OrderStatusType::Pending);
        assert_eq!(store.pending_webhook_count(6), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (api, store, scheduler, clock) = setup();
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let seen = alerts.clone();
        let handler: Handler<WebhookRetriesExhaustedEvent> = Arc::new(move |ev| {
            let seen = seen.clone();
            Box::pin(async move {
                seen.lock().unwrap().push(ev);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let on_exhausted = EventHandler::new(4, handler);
        let producers =
            EventProducers { retries_exhausted_producer: vec![on_exhausted.subscribe()], ..Default::default() };
        let api = WebhookQueueApi::new(api.ctx.clone().with_producers(producers));
        store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(7));

        let err = api.drain_and_apply(7, 6).await.unwrap_err();
        assert!(matches!(err, SyncError::WebhookRetriesExhausted { order_id: 7, retries: 6 }));
        assert!(scheduler.jobs().is_empty());
        // the handler stops once the last producer is gone
        drop(api);
        on_exhausted.start_handler().await;
        let alerts = alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0], WebhookRetriesExhaustedEvent { order_id: 7, retries: 6, at: clock.now() });
    }

    #[tokio::test]
    async fn transient_failures_back_off() {
        let (api, store, scheduler, clock) = setup();
        store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(8));
        api.enqueue(8, entry(OrderStatusType::Pending, OrderStatusType::Completed, clock.now())).await.unwrap();
        store.fail_status_updates(true);
        assert!(matches!(api.drain_and_apply(8, 0).await, Err(SyncError::StoreError(_))));
        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job, SyncJob::drain(8, 1));
        assert_eq!(jobs[0].delay, Duration::from_secs(60));
        // the entry survives for the next attempt
        store.fail_status_updates(false);
        assert_eq!(api.drain_and_apply(8, 1).await.unwrap(), 1);
        assert_eq!(store.fetch_order(8).await.unwrap().unwrap().status, OrderStatusType::Completed);
    }

    #[tokio::test]
    async fn failed_reload_after_a_conflict_keeps_the_entries() {
        let (api, store, scheduler, clock) = setup();
        store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(9));
        api.enqueue(9, entry(OrderStatusType::Pending, OrderStatusType::Completed, clock.now())).await.unwrap();
        api.enqueue(9, entry(OrderStatusType::Completed, OrderStatusType::Refunded, clock.now())).await.unwrap();
        store.reject_status_updates(true);
        store.fail_fetches_after(Some(1));
        assert!(matches!(api.drain_and_apply(9, 0).await, Err(SyncError::StoreError(_))));
        assert_eq!(store.pending_webhook_count(9), 2);
        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job, SyncJob::drain(9, 1));

        store.reject_status_updates(false);
        store.fail_fetches_after(None);
        assert_eq!(api.drain_and_apply(9, 1).await.unwrap(), 2);
        assert_eq!(store.fetch_order(9).await.unwrap().unwrap().status, OrderStatusType::Refunded);
    }
}
