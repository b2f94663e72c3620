use chrono::Utc;
use rust_decimal::Decimal;

use crate::db_types::{LineItem, LocalOrder, NewLocalOrder, OrderStatusType};

/// Two general admission tickets at 5.00 and a 1.50 booking fee.
pub fn sample_items() -> Vec<LineItem> {
    vec![
        LineItem::ticket(7, "General admission", 2, Decimal::new(500, 2)),
        LineItem::fee(1, "Booking fee", Decimal::new(150, 2)),
    ]
}

pub fn sample_local_order(id: i64, status: OrderStatusType) -> LocalOrder {
    NewLocalOrder::new("USD", sample_items()).with_id(id).with_status(status).into_order(id, Utc::now())
}
