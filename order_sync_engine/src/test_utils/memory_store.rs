use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};

use crate::{
    db_types::{GatewayLinkage, ItemKind, LocalOrder, NewLocalOrder, OrderStatusType, PendingWebhook, Ticket},
    traits::{OrderStore, OrderStoreError},
};

#[derive(Debug, Default)]
struct StoreState {
    orders: BTreeMap<i64, LocalOrder>,
    tickets: BTreeMap<i64, Ticket>,
    webhooks: BTreeMap<i64, Vec<PendingWebhook>>,
    last_id: i64,
    fail_saves: bool,
    fail_status_updates: bool,
    reject_status_updates: bool,
    fetches_before_failure: Option<usize>,
    stale_reads: BTreeMap<i64, LocalOrder>,
}

/// An in-memory [`OrderStore`] with switches for injecting storage failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryOrderStore {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores a new order, bypassing the linkage checks of [`OrderStore::create_if_absent`].
    pub fn insert_order(&self, order: NewLocalOrder) -> LocalOrder {
        let mut state = self.lock();
        let id = order.id.unwrap_or(state.last_id + 1);
        state.last_id = state.last_id.max(id);
        let order = order.into_order(id, Utc::now());
        state.orders.insert(id, order.clone());
        order
    }

    /// Replaces the stored order wholesale, status included.
    pub fn overwrite(&self, order: LocalOrder) {
        self.lock().orders.insert(order.id, order);
    }

    pub fn insert_ticket(&self, ticket: Ticket) {
        self.lock().tickets.insert(ticket.id, ticket);
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    pub fn pending_webhook_count(&self, order_id: i64) -> usize {
        self.lock().webhooks.get(&order_id).map(Vec::len).unwrap_or_default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    pub fn fail_status_updates(&self, fail: bool) {
        self.lock().fail_status_updates = fail;
    }

    /// Makes every status update report that the order was no longer in the expected status.
    pub fn reject_status_updates(&self, reject: bool) {
        self.lock().reject_status_updates = reject;
    }

    /// Lets `n` more calls to `fetch_order` succeed, then fails the rest. `None` turns failures off.
    pub fn fail_fetches_after(&self, n: Option<usize>) {
        self.lock().fetches_before_failure = n;
    }

    /// Makes lookups by reference id return `snapshot` instead of the stored row, as a reader that started before a
    /// concurrent write would see it. The stored row is untouched.
    pub fn serve_stale_read(&self, snapshot: LocalOrder) {
        self.lock().stale_reads.insert(snapshot.id, snapshot);
    }

    fn find<P: Fn(&LocalOrder) -> bool>(&self, predicate: P) -> Option<LocalOrder> {
        self.lock().orders.values().find(|o| predicate(o)).cloned()
    }
}

impl OrderStore for MemoryOrderStore {
    async fn fetch_order(&self, id: i64) -> Result<Option<LocalOrder>, OrderStoreError> {
        let mut state = self.lock();
        match state.fetches_before_failure {
            Some(0) => return Err(OrderStoreError::DatabaseError("database is locked".into())),
            Some(n) => state.fetches_before_failure = Some(n - 1),
            None => {},
        }
        Ok(state.orders.get(&id).cloned())
    }

    async fn find_by_reference_id(&self, id: i64) -> Result<Option<LocalOrder>, OrderStoreError> {
        if let Some(snapshot) = self.lock().stale_reads.get(&id).cloned() {
            return Ok(Some(snapshot));
        }
        self.fetch_order(id).await
    }

    async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<LocalOrder>, OrderStoreError> {
        Ok(self.find(|o| o.refund_ids.contains_key(refund_id)))
    }

    async fn find_by_original_gateway_order_id(&self, id: &str) -> Result<Option<LocalOrder>, OrderStoreError> {
        Ok(self.find(|o| o.original_gateway_order_id.as_deref() == Some(id)))
    }

    async fn find_by_gateway_order_id(&self, id: &str) -> Result<Option<LocalOrder>, OrderStoreError> {
        Ok(self.find(|o| o.gateway_order_id.as_deref() == Some(id)))
    }

    async fn create_if_absent(
        &self,
        remote_order_id: &str,
        order: NewLocalOrder,
    ) -> Result<(LocalOrder, bool), OrderStoreError> {
        let mut state = self.lock();
        let linked = |o: &&LocalOrder| {
            o.gateway_order_id.as_deref() == Some(remote_order_id)
                || o.original_gateway_order_id.as_deref() == Some(remote_order_id)
        };
        if let Some(existing) = state.orders.values().find(linked) {
            return Ok((existing.clone(), false));
        }
        let id = order.id.unwrap_or(state.last_id + 1);
        if state.orders.contains_key(&id) {
            return Err(OrderStoreError::DataIntegrity(format!("Order #{id} already exists")));
        }
        state.last_id = state.last_id.max(id);
        let mut order = order.into_order(id, Utc::now());
        order.gateway_order_id = Some(remote_order_id.to_string());
        order.original_gateway_order_id = Some(remote_order_id.to_string());
        for item in order.items.iter().filter(|i| i.kind == ItemKind::Ticket) {
            if let Some(ticket) = state.tickets.get_mut(&item.ref_id) {
                ticket.sold += item.quantity;
            }
        }
        state.orders.insert(id, order.clone());
        Ok((order, true))
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: OrderStatusType,
        new: OrderStatusType,
        linkage: &GatewayLinkage,
    ) -> Result<bool, OrderStoreError> {
        let mut state = self.lock();
        if state.fail_status_updates {
            return Err(OrderStoreError::DatabaseError("database is locked".into()));
        }
        if state.reject_status_updates {
            return Ok(false);
        }
        match state.orders.get_mut(&id) {
            Some(order) if order.status == expected => {
                order.status = new;
                order.apply_linkage(linkage);
                order.updated_at = Utc::now();
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn save(&self, order: &LocalOrder) -> Result<(), OrderStoreError> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(OrderStoreError::DatabaseError("disk I/O error".into()));
        }
        let stored = state.orders.get_mut(&order.id).ok_or(OrderStoreError::OrderNotFound(order.id))?;
        let status = stored.status;
        let version = stored.gateway_order_version.max(order.gateway_order_version);
        let mut payment_ids = std::mem::take(&mut stored.payment_ids);
        let mut refund_ids = std::mem::take(&mut stored.refund_ids);
        *stored = order.clone();
        stored.status = status;
        stored.gateway_order_version = version;
        merge_ids(&mut payment_ids, &order.payment_ids);
        merge_ids(&mut refund_ids, &order.refund_ids);
        stored.payment_ids = payment_ids;
        stored.refund_ids = refund_ids;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn record_payment_ids(
        &self,
        order_id: i64,
        payments: &BTreeMap<String, DateTime<Utc>>,
        refunds: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<(), OrderStoreError> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(OrderStoreError::DatabaseError("disk I/O error".into()));
        }
        let stored = state.orders.get_mut(&order_id).ok_or(OrderStoreError::OrderNotFound(order_id))?;
        merge_ids(&mut stored.payment_ids, payments);
        merge_ids(&mut stored.refund_ids, refunds);
        Ok(())
    }

    async fn enqueue_webhook(&self, order_id: i64, entry: &PendingWebhook) -> Result<(), OrderStoreError> {
        self.lock().webhooks.entry(order_id).or_default().push(entry.clone());
        Ok(())
    }

    async fn take_pending_webhooks(&self, order_id: i64) -> Result<Vec<PendingWebhook>, OrderStoreError> {
        Ok(self.lock().webhooks.remove(&order_id).unwrap_or_default())
    }

    async fn fetch_ticket(&self, id: i64) -> Result<Option<Ticket>, OrderStoreError> {
        Ok(self.lock().tickets.get(&id).cloned())
    }

    async fn fetch_ticket_by_catalog_id(&self, catalog_object_id: &str) -> Result<Option<Ticket>, OrderStoreError> {
        Ok(self.lock().tickets.values().find(|t| t.catalog_object_id.as_deref() == Some(catalog_object_id)).cloned())
    }
}

fn merge_ids(into: &mut BTreeMap<String, DateTime<Utc>>, ids: &BTreeMap<String, DateTime<Utc>>) {
    for (id, at) in ids {
        into.entry(id.clone()).or_insert(*at);
    }
}
