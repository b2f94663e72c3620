use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use super::parse_decimal;
use crate::{
    db_types::{GatewayLinkage, ItemKind, LineItem, LocalOrder, NewLocalOrder, OrderStatusType},
    traits::OrderStoreError,
};

const PAYMENT: &str = "payment";
const REFUND: &str = "refund";

#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: i64,
    status: String,
    currency: String,
    total: String,
    subtotal: String,
    gateway_order_id: Option<String>,
    gateway_order_version: i64,
    gateway_customer_id: Option<String>,
    original_gateway_order_id: Option<String>,
    latest_payload_hash_sent: Option<String>,
    gateway_payload: Option<String>,
    on_checkout_hold_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct ItemRow {
    kind: String,
    ref_id: i64,
    name: String,
    quantity: i64,
    unit_price: String,
    subtotal: String,
    catalog_object_id: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct PaymentRow {
    kind: String,
    external_id: String,
    recorded_at: DateTime<Utc>,
}

pub(crate) fn parse_status(value: &str) -> Result<OrderStatusType, OrderStoreError> {
    OrderStatusType::from_str(value).map_err(|e| OrderStoreError::DataIntegrity(e.to_string()))
}

impl TryFrom<ItemRow> for LineItem {
    type Error = OrderStoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(LineItem {
            kind: ItemKind::from_str(&row.kind).map_err(|e| OrderStoreError::DataIntegrity(e.to_string()))?,
            ref_id: row.ref_id,
            name: row.name,
            quantity: row.quantity,
            unit_price: parse_decimal("unit price", &row.unit_price)?,
            subtotal: parse_decimal("item subtotal", &row.subtotal)?,
            catalog_object_id: row.catalog_object_id,
        })
    }
}

fn assemble(row: OrderRow, items: Vec<ItemRow>, payments: Vec<PaymentRow>) -> Result<LocalOrder, OrderStoreError> {
    let items = items.into_iter().map(LineItem::try_from).collect::<Result<Vec<_>, _>>()?;
    let mut payment_ids = BTreeMap::new();
    let mut refund_ids = BTreeMap::new();
    for p in payments {
        match p.kind.as_str() {
            PAYMENT => payment_ids.insert(p.external_id, p.recorded_at),
            REFUND => refund_ids.insert(p.external_id, p.recorded_at),
            other => return Err(OrderStoreError::DataIntegrity(format!("Unknown payment kind '{other}'"))),
        };
    }
    let gateway_payload: Option<serde_json::Value> =
        row.gateway_payload.as_deref().map(serde_json::from_str).transpose()?;
    Ok(LocalOrder {
        id: row.id,
        status: parse_status(&row.status)?,
        total: parse_decimal("order total", &row.total)?,
        subtotal: parse_decimal("order subtotal", &row.subtotal)?,
        currency: row.currency,
        gateway_order_id: row.gateway_order_id,
        gateway_order_version: row.gateway_order_version,
        gateway_customer_id: row.gateway_customer_id,
        original_gateway_order_id: row.original_gateway_order_id,
        latest_payload_hash_sent: row.latest_payload_hash_sent,
        gateway_payload,
        payment_ids,
        refund_ids,
        on_checkout_hold_until: row.on_checkout_hold_until,
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Inserts a new order, its items and its payment ids. This is not atomic. Call it inside a transaction, passing
/// `&mut *tx` as the connection, if the order must appear all at once.
///
/// When `remote_order_id` is given, the order is linked to it. The unique index on `gateway_order_id` rejects the
/// insert if another order already holds that link.
pub async fn insert_order(
    order: NewLocalOrder,
    remote_order_id: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let payload = order.gateway_payload.as_ref().map(|v| v.to_string());
    let (id,): (i64,) = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                status,
                currency,
                total,
                subtotal,
                gateway_order_id,
                gateway_customer_id,
                original_gateway_order_id,
                gateway_payload,
                on_checkout_hold_until,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $8, $9, $10, $10)
            RETURNING id;
        "#,
    )
    .bind(order.id)
    .bind(order.status.to_string())
    .bind(&order.currency)
    .bind(order.total.to_string())
    .bind(order.subtotal.to_string())
    .bind(remote_order_id)
    .bind(&order.gateway_customer_id)
    .bind(payload)
    .bind(order.on_checkout_hold_until)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    insert_items(id, &order.items, conn).await?;
    for (payment_id, at) in &order.payment_ids {
        record_payment_id(id, PAYMENT, payment_id, *at, conn).await?;
    }
    debug!("🗃️ Order #{id} inserted with {} items", order.items.len());
    Ok(id)
}

async fn insert_items(order_id: i64, items: &[LineItem], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO order_items (
                    order_id, position, kind, ref_id, name, quantity, unit_price, subtotal, catalog_object_id
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order_id)
        .bind(position as i64)
        .bind(item.kind.slug())
        .bind(item.ref_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price.to_string())
        .bind(item.subtotal.to_string())
        .bind(&item.catalog_object_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn record_payment_id(
    order_id: i64,
    kind: &str,
    external_id: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_payments (order_id, kind, external_id, recorded_at) VALUES ($1, $2, $3, $4) ON CONFLICT DO \
         NOTHING",
    )
    .bind(order_id)
    .bind(kind)
    .bind(external_id)
    .bind(at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<LocalOrder>, OrderStoreError> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let items: Vec<ItemRow> = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY position")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    let payments: Vec<PaymentRow> = sqlx::query_as("SELECT * FROM order_payments WHERE order_id = $1")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    assemble(row, items, payments).map(Some)
}

async fn fetch_order_by(
    sql: &str,
    value: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LocalOrder>, OrderStoreError> {
    let id: Option<(i64,)> = sqlx::query_as(sql).bind(value).fetch_optional(&mut *conn).await?;
    match id {
        Some((id,)) => fetch_order(id, conn).await,
        None => Ok(None),
    }
}

pub async fn fetch_order_by_gateway_order_id(
    id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LocalOrder>, OrderStoreError> {
    fetch_order_by("SELECT id FROM orders WHERE gateway_order_id = $1", id, conn).await
}

pub async fn fetch_order_by_original_gateway_order_id(
    id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LocalOrder>, OrderStoreError> {
    fetch_order_by("SELECT id FROM orders WHERE original_gateway_order_id = $1 ORDER BY id LIMIT 1", id, conn).await
}

pub async fn fetch_order_by_refund_id(
    refund_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LocalOrder>, OrderStoreError> {
    let sql =
        "SELECT order_id FROM order_payments WHERE kind = 'refund' AND external_id = $1 ORDER BY order_id LIMIT 1";
    fetch_order_by(sql, refund_id, conn).await
}

/// The order linked to the remote order, either currently or originally.
pub async fn fetch_order_linked_to(
    remote_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LocalOrder>, OrderStoreError> {
    let sql = "SELECT id FROM orders WHERE gateway_order_id = $1 OR original_gateway_order_id = $1 ORDER BY id LIMIT 1";
    fetch_order_by(sql, remote_order_id, conn).await
}

/// Writes every field of the order except its status. Items are replaced. Payment and refund ids are merged, never
/// removed. This is not atomic.
pub async fn update_order(
    order: &LocalOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderStoreError> {
    let payload = order.gateway_payload.as_ref().map(|v| v.to_string());
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                currency = $1,
                total = $2,
                subtotal = $3,
                gateway_order_id = $4,
                gateway_order_version = MAX(gateway_order_version, $5),
                gateway_customer_id = $6,
                original_gateway_order_id = $7,
                latest_payload_hash_sent = $8,
                gateway_payload = $9,
                on_checkout_hold_until = $10,
                updated_at = $11
            WHERE id = $12
        "#,
    )
    .bind(&order.currency)
    .bind(order.total.to_string())
    .bind(order.subtotal.to_string())
    .bind(&order.gateway_order_id)
    .bind(order.gateway_order_version)
    .bind(&order.gateway_customer_id)
    .bind(&order.original_gateway_order_id)
    .bind(&order.latest_payload_hash_sent)
    .bind(payload)
    .bind(order.on_checkout_hold_until)
    .bind(now)
    .bind(order.id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(OrderStoreError::OrderNotFound(order.id));
    }
    sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(order.id).execute(&mut *conn).await?;
    insert_items(order.id, &order.items, conn).await?;
    for (id, at) in &order.payment_ids {
        record_payment_id(order.id, PAYMENT, id, *at, conn).await?;
    }
    for (id, at) in &order.refund_ids {
        record_payment_id(order.id, REFUND, id, *at, conn).await?;
    }
    trace!("🗃️ Order #{} updated", order.id);
    Ok(())
}

/// Records payment and refund ids against an order without touching any of its other fields.
pub async fn record_payment_ids(
    order_id: i64,
    payments: &BTreeMap<String, DateTime<Utc>>,
    refunds: &BTreeMap<String, DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderStoreError> {
    let exists = sqlx::query("SELECT id FROM orders WHERE id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    if exists.is_none() {
        return Err(OrderStoreError::OrderNotFound(order_id));
    }
    for (id, at) in payments {
        record_payment_id(order_id, PAYMENT, id, *at, conn).await?;
    }
    for (id, at) in refunds {
        record_payment_id(order_id, REFUND, id, *at, conn).await?;
    }
    Ok(())
}

/// Moves the order from `expected` to `new` in a single conditional update. Linkage fields that are set in `linkage`
/// are written in the same statement. Returns `false` if the order was not in the expected state.
pub async fn compare_and_set_status(
    id: i64,
    expected: OrderStatusType,
    new: OrderStatusType,
    linkage: &GatewayLinkage,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderStoreError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                gateway_order_id = COALESCE($2, gateway_order_id),
                original_gateway_order_id = COALESCE($3, original_gateway_order_id),
                updated_at = $4
            WHERE id = $5 AND status = $6
        "#,
    )
    .bind(new.to_string())
    .bind(&linkage.gateway_order_id)
    .bind(&linkage.original_gateway_order_id)
    .bind(now)
    .bind(id)
    .bind(expected.to_string())
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Order #{id} {expected} -> {new}: {}", if updated { "updated" } else { "unchanged" });
    Ok(updated)
}
