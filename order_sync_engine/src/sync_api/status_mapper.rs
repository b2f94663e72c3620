use crate::db_types::OrderStatusType;

/// Maps gateway order and refund states onto local order statuses. Matching ignores case.
pub struct StatusMapper;

impl StatusMapper {
    pub fn map(remote_status: &str) -> OrderStatusType {
        match remote_status.trim().to_ascii_uppercase().as_str() {
            "APPROVED" | "COMPLETED" => OrderStatusType::Completed,
            "PENDING" | "OPEN" | "DRAFT" => OrderStatusType::Pending,
            "FAILED" | "CANCELED" => OrderStatusType::Denied,
            "REFUNDED" => OrderStatusType::Refunded,
            _ => OrderStatusType::NotCompleted,
        }
    }

    /// Like [`StatusMapper::map`], except that a completed or approved refund means the order is refunded.
    pub fn map_refund(refund_status: &str) -> OrderStatusType {
        match refund_status.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" | "APPROVED" => OrderStatusType::Refunded,
            other => Self::map(other),
        }
    }
}
