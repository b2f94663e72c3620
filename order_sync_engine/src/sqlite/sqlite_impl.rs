//! `SqliteDatabase` is the SQLite implementation of [`OrderStore`].
//!
//! Every method acquires a connection from the pool and calls through to the functions in [`super::db`]. Methods that
//! must be atomic open a transaction.
use std::{collections::BTreeMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, is_unique_violation, new_pool, orders, tickets, webhooks};
use crate::{
    db_types::{GatewayLinkage, ItemKind, LocalOrder, NewLocalOrder, OrderStatusType, PendingWebhook, Ticket},
    traits::{OrderStore, OrderStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderStore for SqliteDatabase {
    async fn fetch_order(&self, id: i64) -> Result<Option<LocalOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn find_by_reference_id(&self, id: i64) -> Result<Option<LocalOrder>, OrderStoreError> {
        self.fetch_order(id).await
    }

    async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<LocalOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_refund_id(refund_id, &mut conn).await
    }

    async fn find_by_original_gateway_order_id(&self, id: &str) -> Result<Option<LocalOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_original_gateway_order_id(id, &mut conn).await
    }

    async fn find_by_gateway_order_id(&self, id: &str) -> Result<Option<LocalOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_gateway_order_id(id, &mut conn).await
    }

    /// The existence check, the insert and the ticket counter updates share one transaction. If a concurrent caller
    /// commits first, the unique index on `gateway_order_id` rejects our insert and the winner's order is returned.
    async fn create_if_absent(
        &self,
        remote_order_id: &str,
        order: NewLocalOrder,
    ) -> Result<(LocalOrder, bool), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = orders::fetch_order_linked_to(remote_order_id, &mut tx).await? {
            tx.commit().await?;
            return Ok((existing, false));
        }
        let sold = order
            .items
            .iter()
            .filter(|i| i.kind == ItemKind::Ticket)
            .map(|i| (i.ref_id, i.quantity))
            .collect::<Vec<_>>();
        let id = match orders::insert_order(order, Some(remote_order_id), Utc::now(), &mut tx).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                debug!("🗃️ Lost the race to create an order for remote order {remote_order_id}");
                let mut conn = self.pool.acquire().await?;
                let existing = orders::fetch_order_linked_to(remote_order_id, &mut conn).await?.ok_or_else(|| {
                    OrderStoreError::DataIntegrity(format!("No order is linked to remote order {remote_order_id}"))
                })?;
                return Ok((existing, false));
            },
            Err(e) => return Err(e.into()),
        };
        for (ticket_id, quantity) in sold {
            tickets::increment_sold(ticket_id, quantity, &mut tx).await?;
        }
        let created = orders::fetch_order(id, &mut tx).await?.ok_or(OrderStoreError::OrderNotFound(id))?;
        tx.commit().await?;
        info!("🗃️ Order #{id} created for remote order {remote_order_id}");
        Ok((created, true))
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: OrderStatusType,
        new: OrderStatusType,
        linkage: &GatewayLinkage,
    ) -> Result<bool, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::compare_and_set_status(id, expected, new, linkage, Utc::now(), &mut conn).await
    }

    async fn save(&self, order: &LocalOrder) -> Result<(), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        orders::update_order(order, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_payment_ids(
        &self,
        order_id: i64,
        payments: &BTreeMap<String, DateTime<Utc>>,
        refunds: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<(), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        orders::record_payment_ids(order_id, payments, refunds, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn enqueue_webhook(&self, order_id: i64, entry: &PendingWebhook) -> Result<(), OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::enqueue(order_id, entry, &mut conn).await
    }

    async fn take_pending_webhooks(&self, order_id: i64) -> Result<Vec<PendingWebhook>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::take_all(order_id, &mut conn).await
    }

    async fn fetch_ticket(&self, id: i64) -> Result<Option<Ticket>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        tickets::fetch_ticket(id, &mut conn).await
    }

    async fn fetch_ticket_by_catalog_id(&self, catalog_object_id: &str) -> Result<Option<Ticket>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        tickets::fetch_ticket_by_catalog_id(catalog_object_id, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }

    /// Stores a local order that is not yet linked to the gateway, as checkout does. Returns the stored order.
    pub async fn insert_order(&self, order: NewLocalOrder) -> Result<LocalOrder, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let id = orders::insert_order(order, None, Utc::now(), &mut tx).await?;
        let order = orders::fetch_order(id, &mut tx).await?.ok_or(OrderStoreError::OrderNotFound(id))?;
        tx.commit().await?;
        Ok(order)
    }

    /// Adds or replaces a ticket in the catalog.
    pub async fn upsert_ticket(&self, ticket: &Ticket) -> Result<(), OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        tickets::upsert_ticket(ticket, &mut conn).await
    }
}
