//! Read-through cache in front of the gateway's order and customer lookups.
//!
//! Orders and customers live in separate bounded `moka` caches. Entries are evicted once their TTL has passed in real
//! time, and are treated as stale once it has passed on the injected [`Clock`]. Nothing is invalidated on write; the
//! push path seeds the cache with its own fresh response via [`RemoteOrderCache::store_order`]. A zero TTL disables
//! caching for that kind of record.
use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use gateway_tools::{GatewayApiError, RemoteCustomer, RemoteOrder};
use log::*;
use moka::future::Cache;

use crate::{
    helpers::{add_duration, Clock},
    traits::RemoteClient,
};

/// Maximum number of remote orders held at once.
pub const MAX_CACHED_ORDERS: u64 = 10_000;
/// Maximum number of remote customers held at once.
pub const MAX_CACHED_CUSTOMERS: u64 = 10_000;

#[derive(Clone)]
struct Entry<T> {
    expires_at: DateTime<Utc>,
    value: T,
}

/// One kind of cached record, with the TTL it was built with.
struct TtlCache<T> {
    ttl: Duration,
    entries: Option<Cache<String, Entry<T>>>,
}

impl<T: Clone + Send + Sync + 'static> TtlCache<T> {
    fn new(ttl: Duration, capacity: u64) -> Self {
        let entries = (!ttl.is_zero()).then(|| Cache::builder().max_capacity(capacity).time_to_live(ttl).build());
        Self { ttl, entries }
    }

    async fn get(&self, id: &str, now: DateTime<Utc>) -> Option<T> {
        let entries = self.entries.as_ref()?;
        let entry = entries.get(id).await?;
        if now < entry.expires_at {
            return Some(entry.value);
        }
        entries.invalidate(id).await;
        None
    }

    async fn insert(&self, id: String, value: T, now: DateTime<Utc>) {
        if let Some(entries) = &self.entries {
            entries.insert(id, Entry { expires_at: add_duration(now, self.ttl), value }).await;
        }
    }

    async fn len(&self) -> u64 {
        match &self.entries {
            Some(entries) => {
                entries.run_pending_tasks().await;
                entries.entry_count()
            },
            None => 0,
        }
    }
}

pub struct RemoteOrderCache<C> {
    client: C,
    clock: Arc<dyn Clock>,
    orders: TtlCache<RemoteOrder>,
    customers: TtlCache<RemoteCustomer>,
}

impl<C> RemoteOrderCache<C> {
    pub fn new(client: C, clock: Arc<dyn Clock>, order_ttl: Duration, customer_ttl: Duration) -> Self {
        Self {
            client,
            clock,
            orders: TtlCache::new(order_ttl, MAX_CACHED_ORDERS),
            customers: TtlCache::new(customer_ttl, MAX_CACHED_CUSTOMERS),
        }
    }

    pub async fn store_order(&self, order: RemoteOrder) {
        trace!("📥️ Caching remote order {} (v{})", order.id, order.version);
        self.orders.insert(order.id.clone(), order, self.clock.now()).await;
    }

    /// The number of remote orders currently held, after pending evictions have run.
    pub async fn cached_order_count(&self) -> u64 {
        self.orders.len().await
    }
}

impl<C: RemoteClient> RemoteOrderCache<C> {
    pub async fn get_order(&self, id: &str) -> Result<RemoteOrder, GatewayApiError> {
        if let Some(order) = self.orders.get(id, self.clock.now()).await {
            trace!("📥️ Remote order {id} served from cache");
            return Ok(order);
        }
        let order = self.client.get_order(id).await?;
        self.store_order(order.clone()).await;
        Ok(order)
    }

    pub async fn get_customer(&self, id: &str) -> Result<RemoteCustomer, GatewayApiError> {
        if let Some(customer) = self.customers.get(id, self.clock.now()).await {
            return Ok(customer);
        }
        let customer = self.client.get_customer(id).await?;
        self.customers.insert(id.to_string(), customer.clone(), self.clock.now()).await;
        Ok(customer)
    }
}
