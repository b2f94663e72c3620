//! Order Sync Engine
//!
//! The engine keeps local commerce orders and the payment gateway's orders in agreement. Local orders are the source of
//! truth for what was bought; the gateway is the source of truth for whether it was paid, cancelled or refunded.
//!
//! The library is divided into these sections:
//! 1. The sync APIs ([`mod@sync_api`]): push local orders to the gateway, pull gateway state back, defer transitions
//!    that arrive during checkout, and refund remote orders.
//! 2. The collaborator traits ([`mod@traits`]): [`OrderStore`], [`RemoteClient`] and [`Scheduler`]. The engine never
//!    talks to a database, the network or a timer except through these.
//! 3. Implementations of those traits: `SqliteDatabase`, `RemoteClient` for [`gateway_tools::GatewayApi`], and the
//!    tokio-backed scheduler and job worker in [`mod@jobs`].
//!
//! The engine also emits events when an order changes status, or when deferred webhooks could not be applied. See
//! [`mod@events`] for how to hook into them.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod jobs;
pub mod sync_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use sync_api::{
    PullSyncApi,
    PushError,
    PushSyncApi,
    RefundApi,
    RefundOutcome,
    SyncConfig,
    SyncContext,
    SyncError,
    WebhookQueueApi,
};
pub use traits::{OrderStore, OrderStoreError, RemoteClient, Scheduler, SyncJob};
