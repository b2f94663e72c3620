mod clock;
mod hashing;

pub use clock::{add_duration, duration_until, Clock, SystemClock};
pub use hashing::{new_idempotency_key, payload_hash, refund_idempotency_key};
