//! Maps gateway state onto local orders.
//!
//! A pull is triggered by a webhook (via the job worker), by a verification scheduled after a push or refund, or by
//! an operator. It is safe to run any number of pulls for the same remote order concurrently: creation is atomic,
//! status changes are compare-and-set, and transitions that arrive during checkout are parked in the webhook queue.
use std::fmt::Debug;

use gateway_tools::RemoteOrder;
use log::*;
use serde_json::Value;
use sync_common::{from_minor_units, DEFAULT_CURRENCY_CODE};

use crate::{
    db_types::{GatewayLinkage, LocalOrder, NewLocalOrder, OrderStatusType, PendingWebhook},
    events::OrderStatusChangedEvent,
    sync_api::{
        context::SyncContext,
        errors::{SyncError, TranslationError},
        item_translator::ItemTranslator,
        refund_api::RefundApi,
        status_mapper::StatusMapper,
        webhook_queue::WebhookQueueApi,
    },
    traits::{OrderStore, RemoteClient, Scheduler},
};

pub struct PullSyncApi<S, C, Q> {
    ctx: SyncContext<S, C, Q>,
    refunds: RefundApi<S, C, Q>,
    queue: WebhookQueueApi<S, C, Q>,
}

impl<S, C, Q> Debug for PullSyncApi<S, C, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PullSyncApi")
    }
}

impl<S, C, Q> PullSyncApi<S, C, Q>
where
    S: Clone,
    C: Clone,
    Q: Clone,
{
    pub fn new(ctx: SyncContext<S, C, Q>) -> Self {
        let refunds = RefundApi::new(ctx.clone());
        let queue = WebhookQueueApi::new(ctx.clone());
        Self { ctx, refunds, queue }
    }
}

impl<S, C, Q> PullSyncApi<S, C, Q>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    /// Brings the local order for `remote_order_id` in line with the gateway.
    ///
    /// Returns the local order as it stands afterwards, or `None` when there is no local order and none should be
    /// created (refund-only orders, inbound sync disabled, unknown items, or insufficient stock, in which case the
    /// remote order is refunded).
    pub async fn pull(&self, remote_order_id: &str, event: &Value) -> Result<Option<LocalOrder>, SyncError> {
        let remote = self.ctx.cache.get_order(remote_order_id).await?;
        let Some(mut order) = self.resolve_local_order(remote_order_id, &remote).await? else {
            return self.first_sight(remote_order_id, &remote).await;
        };
        let is_refund_event = !remote.refunds.is_empty();
        if let Some(linked_id) = &order.gateway_order_id {
            if linked_id != remote_order_id && !is_refund_event {
                debug!(
                    "📥️ Order #{} has moved on to remote order {linked_id}. Ignoring stale event for {remote_order_id}",
                    order.id
                );
                return Ok(Some(order));
            }
        }

        let now = self.ctx.clock.now();
        let new_payments = order.add_payment_ids(remote.tenders.iter().map(|t| t.id.as_str()), now);
        let new_refunds = order.add_refund_ids(remote.refunds.iter().map(|r| r.id.as_str()), now);
        if new_payments || new_refunds {
            trace!("📥️ Recording new payment or refund ids on order #{}", order.id);
            self.ctx.store.record_payment_ids(order.id, &order.payment_ids, &order.refund_ids).await?;
        }

        let (target, linkage) = target_status(&order, remote_order_id, &remote);

        if let Some(hold_until) = order.on_checkout_hold_until.filter(|_| order.is_on_hold(now)) {
            let entry = PendingWebhook {
                new_status: target,
                old_status: order.status,
                metadata: event.clone(),
                linkage,
                enqueued_at: now,
            };
            self.queue.enqueue(order.id, entry).await?;
            self.queue.schedule_after_hold(order.id, hold_until, 0);
            info!("📥️ Order #{} is on checkout hold. Transition to {target} deferred", order.id);
            return Ok(Some(order));
        }

        if target == order.status {
            if !linkage.is_empty() && order_needs_linkage(&order, &linkage) {
                // a same-status update writes only the linkage columns
                if self.ctx.store.compare_and_set_status(order.id, target, target, &linkage).await? {
                    order.apply_linkage(&linkage);
                } else {
                    warn!("📥️ Order #{} changed status before its linkage could be updated", order.id);
                }
            }
            trace!("📥️ Order #{} is already {target}", order.id);
            return Ok(Some(order));
        }
        let old = order.status;
        if self.ctx.store.compare_and_set_status(order.id, old, target, &linkage).await? {
            info!("📥️ Order #{} moved from {old} to {target} (remote order {remote_order_id})", order.id);
            order.status = target;
            order.apply_linkage(&linkage);
            let event = OrderStatusChangedEvent::new(order.id, old, target)
                .with_gateway_order_id(order.gateway_order_id.clone());
            self.ctx.producers.publish_status_changed(event).await;
            Ok(Some(order))
        } else {
            warn!("📥️ Order #{} changed status while syncing remote order {remote_order_id}", order.id);
            Ok(self.ctx.store.fetch_order(order.id).await?)
        }
    }

    /// Finds the local order for a remote order: first by the remote `reference_id`, then by any refund id the order
    /// has recorded, then by the original remote id. Each step is only consulted if the previous found nothing.
    pub async fn resolve_local_order(
        &self,
        remote_order_id: &str,
        remote: &RemoteOrder,
    ) -> Result<Option<LocalOrder>, SyncError> {
        if let Some(id) = remote.local_reference() {
            if let Some(order) = self.ctx.store.find_by_reference_id(id).await? {
                return Ok(Some(order));
            }
        }
        for refund in &remote.refunds {
            if let Some(order) = self.ctx.store.find_by_refund_id(&refund.id).await? {
                return Ok(Some(order));
            }
        }
        Ok(self.ctx.store.find_by_original_gateway_order_id(remote_order_id).await?)
    }

    async fn first_sight(&self, remote_order_id: &str, remote: &RemoteOrder) -> Result<Option<LocalOrder>, SyncError> {
        if !remote.refunds.is_empty() {
            debug!("📥️ Remote order {remote_order_id} is a refund for an order we do not know. Ignoring.");
            return Ok(None);
        }
        if !self.ctx.config.inbound_sync {
            debug!("📥️ No local order for remote order {remote_order_id}, and inbound sync is disabled.");
            return Ok(None);
        }
        let oversell_protection = self.ctx.config.oversell_protection;
        let translated = match ItemTranslator::from_remote_order(&self.ctx.store, remote, oversell_protection).await {
            Ok(t) => t,
            Err(TranslationError::InsufficientStock { ticket_id, requested, available }) => {
                warn!(
                    "📥️ Remote order {remote_order_id} wants {requested} of ticket {ticket_id}, but only {available} \
                     are left. Refunding it."
                );
                if let Err(e) = self.refunds.refund_remote_order(remote_order_id, None).await {
                    error!("📥️ Could not refund oversold remote order {remote_order_id}. {e}");
                }
                return Ok(None);
            },
            Err(TranslationError::NoRecognizedItems) => {
                info!("📥️ Remote order {remote_order_id} has no tickets we recognise. Not creating an order.");
                return Ok(None);
            },
            Err(e @ TranslationError::AmountOverflow(_)) => {
                error!("📥️ Not creating an order for remote order {remote_order_id}. {e}");
                return Ok(None);
            },
            Err(TranslationError::StoreError(e)) => return Err(e.into()),
        };
        let currency = remote.currency().unwrap_or(DEFAULT_CURRENCY_CODE).to_string();
        let total = remote.net_total().map(|t| from_minor_units(t, &currency)).unwrap_or_else(|| translated.total());
        let now = self.ctx.clock.now();
        let mut new_order = NewLocalOrder::new(&currency, translated.items.clone())
            .with_total(total)
            .with_status(StatusMapper::map(&remote.state));
        new_order.subtotal = translated.ticket_subtotal();
        new_order.gateway_customer_id = remote.customer_id.clone();
        new_order.gateway_payload = serde_json::to_value(remote).ok();
        new_order.payment_ids = remote.tenders.iter().map(|t| (t.id.clone(), now)).collect();
        let (order, created) = self.ctx.store.create_if_absent(remote_order_id, new_order).await?;
        if created {
            info!("📥️ Created order #{} for remote order {remote_order_id}", order.id);
        } else {
            debug!("📥️ Order #{} was created for remote order {remote_order_id} by another worker", order.id);
        }
        Ok(Some(order))
    }
}

/// The status the order should move to, and any linkage change that comes with it.
fn target_status(order: &LocalOrder, remote_order_id: &str, remote: &RemoteOrder) -> (OrderStatusType, GatewayLinkage) {
    let refund_completed = remote.state.eq_ignore_ascii_case("COMPLETED");
    match remote.refunds.first() {
        Some(refund) if refund_completed => {
            let refund_order_id = refund.order_id.clone().unwrap_or_else(|| remote_order_id.to_string());
            let original = order.original_gateway_order_id.clone().unwrap_or_else(|| remote_order_id.to_string());
            let linkage =
                GatewayLinkage { gateway_order_id: Some(refund_order_id), original_gateway_order_id: Some(original) };
            (OrderStatusType::Refunded, linkage)
        },
        _ => (StatusMapper::map(&remote.state), GatewayLinkage::default()),
    }
}

fn order_needs_linkage(order: &LocalOrder, linkage: &GatewayLinkage) -> bool {
    (linkage.gateway_order_id.is_some() && linkage.gateway_order_id != order.gateway_order_id)
        || (linkage.original_gateway_order_id.is_some()
            && linkage.original_gateway_order_id != order.original_gateway_order_id)
}
