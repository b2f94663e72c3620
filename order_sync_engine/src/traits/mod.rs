//! # Collaborator contracts
//!
//! The reconciliation engine never talks to the outside world directly. Everything it needs is expressed as one of
//! three narrow traits, and concrete implementations are injected when the APIs are constructed.
//!
//! * [`RemoteClient`] is the transport to the payment gateway. [`gateway_tools::GatewayApi`] implements it.
//! * [`OrderStore`] persists orders, their line items, tickets and the pending-webhook queue. The SQLite backend
//!   ([`crate::SqliteDatabase`]) implements it.
//! * [`Scheduler`] accepts requests to run a [`SyncJob`] later. The tokio-backed [`crate::jobs::TokioScheduler`]
//!   implements it.
mod order_store;
mod remote_client;
mod scheduler;

pub use order_store::{OrderStore, OrderStoreError};
pub use remote_client::RemoteClient;
pub use scheduler::{Scheduler, SyncJob, DEFAULT_QUEUE, HIGH_PRIORITY_QUEUE};
