//! Deferred job execution.
//!
//! [`TokioScheduler`] implements the engine's [`crate::traits::Scheduler`] with timers on the tokio runtime and hands
//! due jobs to a [`SyncJobWorker`] over two channels. The worker always drains the high-priority queue first.
mod tokio_scheduler;
mod worker;

pub use tokio_scheduler::{JobReceivers, TokioScheduler};
pub use worker::SyncJobWorker;
