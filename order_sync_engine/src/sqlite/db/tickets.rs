use log::trace;
use sqlx::{FromRow, SqliteConnection};

use super::parse_decimal;
use crate::{db_types::Ticket, traits::OrderStoreError};

#[derive(Debug, Clone, FromRow)]
struct TicketRow {
    id: i64,
    name: String,
    catalog_object_id: Option<String>,
    price: String,
    stock: Option<i64>,
    sold: i64,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = OrderStoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: row.id,
            name: row.name,
            catalog_object_id: row.catalog_object_id,
            price: parse_decimal("ticket price", &row.price)?,
            stock: row.stock,
            sold: row.sold,
        })
    }
}

/// Inserts the ticket, or replaces the existing ticket with the same id.
pub async fn upsert_ticket(ticket: &Ticket, conn: &mut SqliteConnection) -> Result<(), OrderStoreError> {
    sqlx::query(
        r#"
            INSERT INTO tickets (id, name, catalog_object_id, price, stock, sold) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                catalog_object_id = excluded.catalog_object_id,
                price = excluded.price,
                stock = excluded.stock,
                sold = excluded.sold
        "#,
    )
    .bind(ticket.id)
    .bind(&ticket.name)
    .bind(&ticket.catalog_object_id)
    .bind(ticket.price.to_string())
    .bind(ticket.stock)
    .bind(ticket.sold)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_ticket(id: i64, conn: &mut SqliteConnection) -> Result<Option<Ticket>, OrderStoreError> {
    let row: Option<TicketRow> =
        sqlx::query_as("SELECT * FROM tickets WHERE id = $1").bind(id).fetch_optional(conn).await?;
    row.map(Ticket::try_from).transpose()
}

pub async fn fetch_ticket_by_catalog_id(
    catalog_object_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Ticket>, OrderStoreError> {
    let row: Option<TicketRow> = sqlx::query_as("SELECT * FROM tickets WHERE catalog_object_id = $1")
        .bind(catalog_object_id)
        .fetch_optional(conn)
        .await?;
    row.map(Ticket::try_from).transpose()
}

/// Adds `quantity` to the ticket's sales counter. Unknown tickets are ignored.
pub async fn increment_sold(ticket_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<(), OrderStoreError> {
    let result = sqlx::query("UPDATE tickets SET sold = sold + $1 WHERE id = $2")
        .bind(quantity)
        .bind(ticket_id)
        .execute(conn)
        .await?;
    trace!("🗃️ Ticket {ticket_id} sales incremented by {quantity} ({} rows)", result.rows_affected());
    Ok(())
}
