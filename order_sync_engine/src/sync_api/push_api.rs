use std::fmt::Debug;

use gateway_tools::{Metadata, Money, OrderPayload, RemoteDiscount, RemoteServiceCharge};
use log::*;
use serde_json::json;
use sync_common::to_minor_units;

use crate::{
    db_types::LocalOrder,
    helpers::{new_idempotency_key, payload_hash},
    sync_api::{
        context::SyncContext,
        errors::PushError,
        item_translator::{ItemTranslator, LOCAL_KIND_KEY},
    },
    traits::{OrderStore, RemoteClient, Scheduler, SyncJob, DEFAULT_QUEUE},
};

pub const ROUNDING_ADJUSTMENT_NAME: &str = "Rounding adjustment";
pub const ROUNDING_KIND: &str = "rounding";

/// `PushSyncApi` writes local orders to the gateway at checkout time.
pub struct PushSyncApi<S, C, Q> {
    ctx: SyncContext<S, C, Q>,
}

impl<S, C, Q> Debug for PushSyncApi<S, C, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PushSyncApi")
    }
}

impl<S, C, Q> PushSyncApi<S, C, Q> {
    pub fn new(ctx: SyncContext<S, C, Q>) -> Self {
        Self { ctx }
    }
}

impl<S, C, Q> PushSyncApi<S, C, Q>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    /// The payload describing `order`, before any rounding adjustment.
    pub fn build_payload(&self, order: &LocalOrder) -> OrderPayload {
        let items = ItemTranslator::to_remote_payload(order);
        let mut metadata = Metadata::new();
        metadata.insert("local_order_id".to_string(), order.id.to_string());
        OrderPayload {
            location_id: self.ctx.config.location_id.clone(),
            reference_id: order.id.to_string(),
            state: "OPEN".to_string(),
            customer_id: order.gateway_customer_id.clone(),
            version: None,
            line_items: items.line_items,
            discounts: items.discounts,
            service_charges: items.service_charges,
            metadata,
        }
    }

    /// Creates or updates the remote counterpart of `order` and returns its remote id.
    ///
    /// If the order is already linked and nothing has changed since the last push, no remote call is made. Otherwise
    /// the gateway prices the order first, and any difference between its total and the local total is absorbed by a
    /// rounding discount or service charge so that the two agree exactly.
    pub async fn push(&self, order: &LocalOrder) -> Result<String, PushError> {
        let payload = self.build_payload(order);
        // The gateway can attach a customer on its own. That is not a local change.
        let hash = payload_hash(&OrderPayload { customer_id: None, ..payload.clone() });
        if let Some(remote_id) = &order.gateway_order_id {
            if order.latest_payload_hash_sent.as_deref() == Some(hash.as_str()) {
                debug!("🔄️ Order #{} is unchanged since the last push to {remote_id}", order.id);
                return Ok(remote_id.clone());
            }
        }

        let calculate_key = new_idempotency_key();
        let calculated = self
            .ctx
            .client
            .calculate(&payload, &calculate_key)
            .await
            .map_err(|e| PushError::CalculateFailed(e.to_string()))?;
        let remote_total = calculated
            .calculated_total()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| PushError::CalculateFailed(format!("No total was calculated for order #{}", order.id)))?;
        let local_total =
            to_minor_units(order.total, &order.currency).map_err(|e| PushError::CalculateFailed(e.to_string()))?;

        let mut outgoing = payload;
        let diff = remote_total - local_total;
        let adjustment = Money { amount: diff.abs(), currency: order.currency.clone() };
        let mut rounding_meta = Metadata::new();
        rounding_meta.insert(LOCAL_KIND_KEY.to_string(), ROUNDING_KIND.to_string());
        if diff.value() > 0 {
            debug!("🔄️ Gateway total for order #{} is {diff} over. Adding a rounding discount", order.id);
            outgoing.discounts.push(RemoteDiscount::fixed(ROUNDING_ADJUSTMENT_NAME, adjustment, rounding_meta));
        } else if diff.value() < 0 {
            debug!("🔄️ Gateway total for order #{} is {} under. Adding a rounding charge", order.id, -diff);
            let charge = RemoteServiceCharge::fixed(ROUNDING_ADJUSTMENT_NAME, adjustment, rounding_meta);
            outgoing.service_charges.push(charge);
        }
        if order.gateway_order_id.is_some() {
            outgoing.version = Some(order.gateway_order_version.max(1));
        }

        let upsert_key = new_idempotency_key();
        let remote = self
            .ctx
            .client
            .upsert_order(order.gateway_order_id.as_deref(), &outgoing, &upsert_key)
            .await
            .map_err(|e| PushError::UpsertFailed(e.to_string()))?;
        info!("🔄️ Order #{} pushed to remote order {} (v{})", order.id, remote.id, remote.version);

        let mut updated = order.clone();
        updated.gateway_order_id = Some(remote.id.clone());
        if updated.original_gateway_order_id.is_none() {
            updated.original_gateway_order_id = Some(remote.id.clone());
        }
        if remote.customer_id.is_some() {
            updated.gateway_customer_id = remote.customer_id.clone();
        }
        updated.gateway_order_version = updated.gateway_order_version.max(remote.version);
        updated.latest_payload_hash_sent = Some(hash);
        updated.gateway_payload = serde_json::to_value(&remote).ok();
        if let Err(e) = self.ctx.store.save(&updated).await {
            error!(
                "🔄️ Remote order {} was written, but order #{} could not be updated with its linkage. {e}",
                remote.id, order.id
            );
            return Err(PushError::PersistFailed {
                order_id: order.id,
                remote_order_id: remote.id,
                reason: e.to_string(),
            });
        }
        let remote_id = remote.id.clone();
        self.ctx.cache.store_order(remote).await;
        let job = SyncJob::pull(remote_id.clone(), json!({ "type": "push.verification", "order_id": order.id }));
        self.ctx.scheduler.schedule_once(self.ctx.config.push_verification_delay, DEFAULT_QUEUE, job);
        Ok(remote_id)
    }
}
