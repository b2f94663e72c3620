use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{GatewayLinkage, LocalOrder, NewLocalOrder, OrderStatusType, PendingWebhook, Ticket};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Stored data is inconsistent: {0}")]
    DataIntegrity(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for OrderStoreError {
    fn from(e: serde_json::Error) -> Self {
        OrderStoreError::DataIntegrity(e.to_string())
    }
}

impl OrderStoreError {
    /// Driver-level failures (locked database, pool timeouts) may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderStoreError::DatabaseError(_))
    }
}

/// Persistence for local orders, their tickets and the pending-webhook queue.
///
/// Implementations must make [`OrderStore::create_if_absent`], [`OrderStore::compare_and_set_status`] and
/// [`OrderStore::take_pending_webhooks`] atomic. The engine relies on them for correctness when several workers
/// process events for the same order.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    async fn fetch_order(&self, id: i64) -> Result<Option<LocalOrder>, OrderStoreError>;

    /// Resolves a gateway `reference_id` (which is a local order id) to its order.
    async fn find_by_reference_id(&self, id: i64) -> Result<Option<LocalOrder>, OrderStoreError>;

    /// The order that has recorded the given refund id, if any.
    async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<LocalOrder>, OrderStoreError>;

    async fn find_by_original_gateway_order_id(&self, id: &str) -> Result<Option<LocalOrder>, OrderStoreError>;

    async fn find_by_gateway_order_id(&self, id: &str) -> Result<Option<LocalOrder>, OrderStoreError>;

    /// Creates an order linked to `remote_order_id`, unless one already is.
    ///
    /// The check and the insert happen atomically. Ticket sales counters are incremented in the same transaction.
    /// Returns the order linked to the remote order and `true` if this call created it. A caller that loses a
    /// creation race receives the winner's order and `false`.
    async fn create_if_absent(
        &self,
        remote_order_id: &str,
        order: NewLocalOrder,
    ) -> Result<(LocalOrder, bool), OrderStoreError>;

    /// Sets the order status to `new` only if it is currently `expected`, applying `linkage` in the same write.
    /// Returns whether the update happened.
    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: OrderStatusType,
        new: OrderStatusType,
        linkage: &GatewayLinkage,
    ) -> Result<bool, OrderStoreError>;

    /// Persists everything about the order except its status. Status only ever changes through
    /// [`OrderStore::compare_and_set_status`].
    /// Never lowers the stored `gateway_order_version`.
    async fn save(&self, order: &LocalOrder) -> Result<(), OrderStoreError>;

    /// Merges payment and refund ids into the order's recorded sets, touching nothing else. Ids that are already
    /// recorded keep their original timestamp.
    async fn record_payment_ids(
        &self,
        order_id: i64,
        payments: &BTreeMap<String, DateTime<Utc>>,
        refunds: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<(), OrderStoreError>;

    async fn enqueue_webhook(&self, order_id: i64, entry: &PendingWebhook) -> Result<(), OrderStoreError>;

    /// Removes and returns every pending webhook for the order, oldest first.
    async fn take_pending_webhooks(&self, order_id: i64) -> Result<Vec<PendingWebhook>, OrderStoreError>;

    async fn fetch_ticket(&self, id: i64) -> Result<Option<Ticket>, OrderStoreError>;

    async fn fetch_ticket_by_catalog_id(&self, catalog_object_id: &str) -> Result<Option<Ticket>, OrderStoreError>;
}
