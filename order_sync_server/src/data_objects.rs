use std::fmt::Display;

use order_sync_engine::db_types::LocalOrder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResult {
    pub order_id: i64,
    pub remote_order_id: String,
}

/// The outcome of an operator-triggered pull. `order` is `None` when the remote order has no local counterpart and
/// none was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub remote_order_id: String,
    pub order: Option<LocalOrder>,
}
