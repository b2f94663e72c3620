use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, SqliteConnection};

use super::orders::parse_status;
use crate::{
    db_types::{GatewayLinkage, PendingWebhook},
    traits::OrderStoreError,
};

#[derive(Debug, Clone, FromRow)]
struct PendingWebhookRow {
    id: i64,
    new_status: String,
    old_status: String,
    metadata: String,
    gateway_order_id: Option<String>,
    original_gateway_order_id: Option<String>,
    enqueued_at: DateTime<Utc>,
}

impl TryFrom<PendingWebhookRow> for PendingWebhook {
    type Error = OrderStoreError;

    fn try_from(row: PendingWebhookRow) -> Result<Self, Self::Error> {
        Ok(PendingWebhook {
            new_status: parse_status(&row.new_status)?,
            old_status: parse_status(&row.old_status)?,
            metadata: serde_json::from_str(&row.metadata)?,
            linkage: GatewayLinkage {
                gateway_order_id: row.gateway_order_id,
                original_gateway_order_id: row.original_gateway_order_id,
            },
            enqueued_at: row.enqueued_at,
        })
    }
}

pub async fn enqueue(
    order_id: i64,
    entry: &PendingWebhook,
    conn: &mut SqliteConnection,
) -> Result<(), OrderStoreError> {
    sqlx::query(
        r#"
            INSERT INTO pending_webhooks (
                order_id, new_status, old_status, metadata, gateway_order_id, original_gateway_order_id, enqueued_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(order_id)
    .bind(entry.new_status.to_string())
    .bind(entry.old_status.to_string())
    .bind(entry.metadata.to_string())
    .bind(&entry.linkage.gateway_order_id)
    .bind(&entry.linkage.original_gateway_order_id)
    .bind(entry.enqueued_at)
    .execute(conn)
    .await?;
    trace!("🗃️ Webhook {} -> {} queued for order #{order_id}", entry.old_status, entry.new_status);
    Ok(())
}

/// Deletes and returns all queued entries for the order in insertion order. The single `DELETE .. RETURNING`
/// statement guarantees that concurrent callers never receive the same entry.
pub async fn take_all(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<PendingWebhook>, OrderStoreError> {
    let sql = "DELETE FROM pending_webhooks WHERE order_id = $1 RETURNING *";
    let mut rows: Vec<PendingWebhookRow> = sqlx::query_as(sql)
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    rows.sort_by_key(|r| r.id);
    rows.into_iter().map(PendingWebhook::try_from).collect()
}
