use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use gateway_tools::{
    helpers::parse_quantity,
    CalculatedOrder,
    GatewayApiError,
    Money,
    NetAmounts,
    OrderPayload,
    PaymentRefund,
    RemoteCustomer,
    RemoteOrder,
    RemoteRefund,
    Tender,
};
use sync_common::{MinorUnits, DEFAULT_CURRENCY_CODE};

use crate::traits::RemoteClient;

#[derive(Debug, Default)]
struct GatewayState {
    orders: HashMap<String, RemoteOrder>,
    customers: HashMap<String, RemoteCustomer>,
    refunds: Vec<(String, PaymentRefund)>,
    upsert_calls: Vec<(Option<String>, OrderPayload)>,
    idempotency_keys: Vec<String>,
    calculate_calls: usize,
    get_order_calls: usize,
    get_customer_calls: usize,
    calculated_total: Option<Option<i64>>,
    upsert_error: Option<GatewayApiError>,
    failing_tenders: HashSet<String>,
    last_id: u64,
}

impl GatewayState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.last_id += 1;
        format!("{prefix}-{}", self.last_id)
    }
}

/// An in-memory payment gateway that records every call made to it.
///
/// Calculations price the payload exactly unless a total is forced with [`FakeGateway::set_calculated_total`].
/// Refunds are deduplicated on their idempotency key and are attached to the order holding the refunded tender.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

fn not_found(what: &str, id: &str) -> GatewayApiError {
    GatewayApiError::QueryError { status: 404, message: format!("{what} {id} not found") }
}

/// Line items at base price times quantity, plus service charges, less discounts.
pub fn payload_total(payload: &OrderPayload) -> MinorUnits {
    let lines = payload
        .line_items
        .iter()
        .map(|li| {
            let quantity = parse_quantity(&li.quantity).unwrap_or_default();
            li.base_price_money.as_ref().map(|m| m.amount * quantity).unwrap_or_default()
        })
        .sum::<MinorUnits>();
    let charges =
        payload.service_charges.iter().filter_map(|sc| sc.effective_money()).map(|m| m.amount).sum::<MinorUnits>();
    let discounts =
        payload.discounts.iter().filter_map(|d| d.effective_money()).map(|m| m.amount.abs()).sum::<MinorUnits>();
    lines + charges - discounts
}

fn payload_currency(payload: &OrderPayload) -> String {
    payload
        .line_items
        .iter()
        .find_map(|li| li.base_price_money.as_ref().map(|m| m.currency.clone()))
        .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string())
}

impl FakeGateway {
    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_order(&self, order: RemoteOrder) {
        self.lock().orders.insert(order.id.clone(), order);
    }

    pub fn insert_customer(&self, customer: RemoteCustomer) {
        self.lock().customers.insert(customer.id.clone(), customer);
    }

    pub fn order(&self, id: &str) -> Option<RemoteOrder> {
        self.lock().orders.get(id).cloned()
    }

    /// Sets the order's state, bumping its version.
    pub fn set_state(&self, id: &str, state: &str) {
        if let Some(order) = self.lock().orders.get_mut(id) {
            order.state = state.to_string();
            order.version += 1;
        }
    }

    /// Adds a tender covering the order's total.
    pub fn add_tender(&self, id: &str, tender_id: &str) {
        if let Some(order) = self.lock().orders.get_mut(id) {
            let amount_money = order.net_amounts.as_ref().map(|n| n.total_money.clone()).unwrap_or_default();
            order.tenders.push(Tender { id: tender_id.to_string(), amount_money, payment_id: None });
        }
    }

    pub fn get_order_calls(&self) -> usize {
        self.lock().get_order_calls
    }

    pub fn get_customer_calls(&self) -> usize {
        self.lock().get_customer_calls
    }

    pub fn calculate_calls(&self) -> usize {
        self.lock().calculate_calls
    }

    pub fn upsert_calls(&self) -> Vec<(Option<String>, OrderPayload)> {
        self.lock().upsert_calls.clone()
    }

    /// Every idempotency key sent with a calculate or upsert call, in order.
    pub fn idempotency_keys(&self) -> Vec<String> {
        self.lock().idempotency_keys.clone()
    }

    pub fn refunds(&self) -> Vec<PaymentRefund> {
        self.lock().refunds.iter().map(|(_, r)| r.clone()).collect()
    }

    /// Forces the total returned by calculations. With `None`, calculations return no total at all.
    pub fn set_calculated_total(&self, total: Option<i64>) {
        self.lock().calculated_total = Some(total);
    }

    pub fn fail_upserts(&self, error: Option<GatewayApiError>) {
        self.lock().upsert_error = error;
    }

    pub fn fail_refunds_for(&self, tender_id: &str) {
        self.lock().failing_tenders.insert(tender_id.to_string());
    }
}

impl RemoteClient for FakeGateway {
    async fn calculate(
        &self,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<CalculatedOrder, GatewayApiError> {
        let mut state = self.lock();
        state.calculate_calls += 1;
        state.idempotency_keys.push(idempotency_key.to_string());
        let total = match state.calculated_total {
            Some(forced) => forced.map(MinorUnits::from),
            None => Some(payload_total(payload)),
        };
        let currency = payload_currency(payload);
        let total_money = total.map(|amount| Money { amount, currency });
        Ok(CalculatedOrder { total_money, net_amounts: None })
    }

    async fn upsert_order(
        &self,
        id: Option<&str>,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<RemoteOrder, GatewayApiError> {
        let mut state = self.lock();
        state.idempotency_keys.push(idempotency_key.to_string());
        state.upsert_calls.push((id.map(String::from), payload.clone()));
        if let Some(e) = &state.upsert_error {
            return Err(e.clone());
        }
        let (id, version) = match id {
            Some(id) => {
                let existing = state.orders.get(id).ok_or_else(|| not_found("Order", id))?;
                let expected = existing.version;
                if payload.version.is_some_and(|v| v != expected) {
                    let message = format!("Version mismatch for {id}: expected {expected}");
                    return Err(GatewayApiError::QueryError { status: 409, message });
                }
                (id.to_string(), expected + 1)
            },
            None => (state.next_id("RO"), 1),
        };
        let currency = payload_currency(payload);
        let total_money = Money { amount: payload_total(payload), currency };
        let previous = state.orders.remove(&id).unwrap_or_default();
        let order = RemoteOrder {
            id: id.clone(),
            version,
            state: if previous.state.is_empty() { payload.state.clone() } else { previous.state },
            reference_id: Some(payload.reference_id.clone()),
            customer_id: payload.customer_id.clone(),
            location_id: payload.location_id.clone(),
            line_items: payload.line_items.clone(),
            discounts: payload.discounts.clone(),
            service_charges: payload.service_charges.clone(),
            tenders: previous.tenders,
            refunds: previous.refunds,
            net_amounts: Some(NetAmounts { total_money, ..Default::default() }),
            metadata: payload.metadata.clone(),
            ..Default::default()
        };
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: &str) -> Result<RemoteOrder, GatewayApiError> {
        let mut state = self.lock();
        state.get_order_calls += 1;
        state.orders.get(id).cloned().ok_or_else(|| not_found("Order", id))
    }

    async fn get_customer(&self, id: &str) -> Result<RemoteCustomer, GatewayApiError> {
        let mut state = self.lock();
        state.get_customer_calls += 1;
        state.customers.get(id).cloned().ok_or_else(|| not_found("Customer", id))
    }

    async fn refund(
        &self,
        idempotency_key: &str,
        payment_id: &str,
        amount: &Money,
    ) -> Result<PaymentRefund, GatewayApiError> {
        let mut state = self.lock();
        if let Some((_, refund)) = state.refunds.iter().find(|(k, _)| k == idempotency_key) {
            return Ok(refund.clone());
        }
        if state.failing_tenders.contains(payment_id) {
            let message = format!("Payment {payment_id} cannot be refunded");
            return Err(GatewayApiError::QueryError { status: 400, message });
        }
        let refund_id = state.next_id("RF");
        let order_id = state
            .orders
            .values()
            .find(|o| o.tenders.iter().any(|t| t.id == payment_id))
            .map(|o| o.id.clone());
        let refund = PaymentRefund {
            id: refund_id,
            status: "COMPLETED".to_string(),
            payment_id: payment_id.to_string(),
            order_id: order_id.clone(),
            amount_money: amount.clone(),
        };
        if let Some(order) = order_id.as_ref().and_then(|id| state.orders.get_mut(id)) {
            order.refunds.push(RemoteRefund {
                id: refund.id.clone(),
                status: refund.status.clone(),
                order_id: order_id.clone(),
                tender_id: Some(payment_id.to_string()),
                amount_money: Some(amount.clone()),
            });
            order.version += 1;
        }
        state.refunds.push((idempotency_key.to_string(), refund.clone()));
        Ok(refund)
    }
}
