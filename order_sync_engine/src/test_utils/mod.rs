//! Doubles and fixtures for exercising the sync APIs without a gateway or a database.
mod fake_gateway;
mod fixtures;
mod manual_clock;
mod memory_store;
#[cfg(feature = "sqlite")]
pub mod prepare_env;
mod recording_scheduler;

pub use fake_gateway::{payload_total, FakeGateway};
pub use fixtures::{sample_items, sample_local_order};
pub use manual_clock::ManualClock;
pub use memory_store::MemoryOrderStore;
pub use recording_scheduler::{RecordingScheduler, ScheduledJob};
