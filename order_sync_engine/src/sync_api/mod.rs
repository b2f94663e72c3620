//! The order synchronisation APIs.
//!
//! Each API wraps a [`SyncContext`], which bundles the order store, the gateway client, the job scheduler and the
//! shared remote-order cache. The APIs are cheap to construct and can be created per request.
//!
//! * [`PushSyncApi`] writes local orders to the gateway during checkout.
//! * [`PullSyncApi`] maps gateway state back onto local orders.
//! * [`WebhookQueueApi`] parks transitions that arrive during a checkout hold and applies them afterwards.
//! * [`RefundApi`] refunds every tender of a remote order.
mod config;
mod context;
mod errors;
mod item_translator;
mod pull_api;
mod push_api;
mod refund_api;
mod remote_cache;
mod status_mapper;
mod webhook_queue;

pub use config::SyncConfig;
pub use context::SyncContext;
pub use errors::{PushError, SyncError, TranslationError};
pub use item_translator::{ItemTranslator, RemoteLineItems, TranslatedItems, LOCAL_ID_KEY, LOCAL_KIND_KEY};
pub use pull_api::PullSyncApi;
pub use push_api::{PushSyncApi, ROUNDING_ADJUSTMENT_NAME, ROUNDING_KIND};
pub use refund_api::{RefundApi, RefundOutcome};
pub use remote_cache::RemoteOrderCache;
pub use status_mapper::StatusMapper;
pub use webhook_queue::WebhookQueueApi;
