//! Order sync events
//!
//! Components subscribe to engine events through [`EventHooks`]. The engine only ever sees the producing side
//! ([`EventProducers`]); each hook runs on its own handler task.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
