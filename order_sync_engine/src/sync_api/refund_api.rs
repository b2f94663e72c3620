use std::{collections::BTreeMap, fmt::Debug};

use gateway_tools::{GatewayApiError, PaymentRefund};
use log::*;
use serde_json::json;

use crate::{
    db_types::{LocalOrder, OrderStatusType},
    helpers::refund_idempotency_key,
    sync_api::{context::SyncContext, errors::SyncError, status_mapper::StatusMapper},
    traits::{OrderStore, RemoteClient, Scheduler, SyncJob, HIGH_PRIORITY_QUEUE},
};

/// The result of refunding a single tender.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub tender_id: String,
    pub idempotency_key: String,
    pub result: Result<PaymentRefund, GatewayApiError>,
}

impl RefundOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The local status the refund implies, if the gateway accepted it.
    pub fn status(&self) -> Option<OrderStatusType> {
        self.result.as_ref().ok().map(|r| StatusMapper::map_refund(&r.status))
    }
}

/// `RefundApi` returns the money for every tender on a remote order.
pub struct RefundApi<S, C, Q> {
    ctx: SyncContext<S, C, Q>,
}

impl<S, C, Q> Debug for RefundApi<S, C, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<S, C, Q> RefundApi<S, C, Q> {
    pub fn new(ctx: SyncContext<S, C, Q>) -> Self {
        Self { ctx }
    }
}

impl<S, C, Q> RefundApi<S, C, Q>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    /// Refunds each tender of the remote order in full.
    ///
    /// Idempotency keys derive from the tender id alone, so calling this again for the same order never refunds a
    /// tender twice. A failed tender is logged and the remaining tenders are still attempted. Successful refunds are
    /// recorded on `local` (and saved) when it is given, and a high-priority pull verifies each one later.
    pub async fn refund_remote_order(
        &self,
        remote_order_id: &str,
        mut local: Option<&mut LocalOrder>,
    ) -> Result<Vec<RefundOutcome>, SyncError> {
        let remote = self.ctx.cache.get_order(remote_order_id).await?;
        let now = self.ctx.clock.now();
        let mut outcomes = Vec::with_capacity(remote.tenders.len());
        let mut recorded = false;
        for tender in &remote.tenders {
            let key = refund_idempotency_key(&tender.id);
            let result = self.ctx.client.refund(&key, &tender.id, &tender.amount_money).await;
            match &result {
                Ok(refund) => {
                    info!(
                        "💸️ Refund {} of {} {} issued for tender {} on remote order {remote_order_id}",
                        refund.id, tender.amount_money.amount, tender.amount_money.currency, tender.id
                    );
                    if let Some(order) = local.as_deref_mut() {
                        recorded |= order.add_refund_ids([refund.id.as_str()], now);
                    }
                    let verify_id = refund.order_id.clone().unwrap_or_else(|| remote_order_id.to_string());
                    let event = json!({ "type": "refund.verification", "refund_id": refund.id });
                    let delay = self.ctx.config.refund_verification_delay;
                    self.ctx.scheduler.schedule_once(delay, HIGH_PRIORITY_QUEUE, SyncJob::pull(verify_id, event));
                },
                Err(e) => {
                    error!("💸️ Could not refund tender {} on remote order {remote_order_id}. {e}", tender.id);
                },
            }
            outcomes.push(RefundOutcome { tender_id: tender.id.clone(), idempotency_key: key, result });
        }
        if let Some(order) = local {
            if recorded {
                self.ctx.store.record_payment_ids(order.id, &BTreeMap::new(), &order.refund_ids).await?;
            }
        }
        Ok(outcomes)
    }
}
