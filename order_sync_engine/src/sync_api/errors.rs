use gateway_tools::GatewayApiError;
use thiserror::Error;

use crate::traits::OrderStoreError;

/// Failures translating a remote order into local line items.
#[derive(Debug, Clone, Error)]
pub enum TranslationError {
    /// Creating the order would oversell a ticket. Retrying the same payload cannot succeed; the remote order must be
    /// refunded instead.
    #[error("Ticket {ticket_id} has {available} left, but {requested} were requested")]
    InsufficientStock { ticket_id: i64, requested: i64, available: i64 },
    #[error("The remote order contains no tickets that exist locally")]
    NoRecognizedItems,
    #[error("Line item amounts on remote order {0} do not fit in minor units")]
    AmountOverflow(String),
    #[error("Could not look up tickets. {0}")]
    StoreError(#[from] OrderStoreError),
}

/// Failures pushing a local order to the gateway. These surface to the checkout flow.
#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("The gateway could not price the order. {0}")]
    CalculateFailed(String),
    #[error("The gateway rejected the order. {0}")]
    UpsertFailed(String),
    /// The remote write succeeded, but the linkage could not be stored locally.
    #[error("Remote order {remote_order_id} was written but could not be linked to local order {order_id}. {reason}")]
    PersistFailed { order_id: i64, remote_order_id: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Gateway error. {0}")]
    RemoteError(#[from] GatewayApiError),
    #[error("Storage error. {0}")]
    StoreError(#[from] OrderStoreError),
    #[error("Gave up applying pending webhooks for order {order_id} after {retries} retries")]
    WebhookRetriesExhausted { order_id: i64, retries: u32 },
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
}
