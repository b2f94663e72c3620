use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::OrderStatusType;

/// A local order moved from one status to another in response to gateway activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order_id: i64,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub gateway_order_id: Option<String>,
}

impl OrderStatusChangedEvent {
    pub fn new(order_id: i64, old_status: OrderStatusType, new_status: OrderStatusType) -> Self {
        Self { order_id, old_status, new_status, gateway_order_id: None }
    }

    pub fn with_gateway_order_id(mut self, id: Option<String>) -> Self {
        self.gateway_order_id = id;
        self
    }
}

/// The pending webhooks for an order could not be applied within the retry ceiling. An operator needs to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRetriesExhaustedEvent {
    pub order_id: i64,
    pub retries: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderStatusChanged(OrderStatusChangedEvent),
    WebhookRetriesExhausted(WebhookRetriesExhaustedEvent),
}
