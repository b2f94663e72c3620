use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Checkout has started, but the gateway has not settled the order.
    Pending,
    /// The gateway reports the order as paid.
    Completed,
    /// The gateway declined or cancelled the order.
    Denied,
    /// The order was paid and subsequently refunded.
    Refunded,
    /// Catch-all for gateway states with no local meaning.
    NotCompleted,
}

impl OrderStatusType {
    pub fn slug(&self) -> &'static str {
        match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Completed => "completed",
            OrderStatusType::Denied => "denied",
            OrderStatusType::Refunded => "refunded",
            OrderStatusType::NotCompleted => "not-completed",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Denied => write!(f, "Denied"),
            OrderStatusType::Refunded => write!(f, "Refunded"),
            OrderStatusType::NotCompleted => write!(f, "NotCompleted"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(Self::Pending),
            "Completed" | "completed" => Ok(Self::Completed),
            "Denied" | "denied" => Ok(Self::Denied),
            "Refunded" | "refunded" => Ok(Self::Refunded),
            "NotCompleted" | "not-completed" => Ok(Self::NotCompleted),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------       ItemKind        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Ticket,
    Coupon,
    Fee,
}

impl ItemKind {
    pub fn slug(&self) -> &'static str {
        match self {
            ItemKind::Ticket => "ticket",
            ItemKind::Coupon => "coupon",
            ItemKind::Fee => "fee",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ItemKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticket" => Ok(Self::Ticket),
            "coupon" => Ok(Self::Coupon),
            "fee" => Ok(Self::Fee),
            s => Err(ConversionError(format!("Invalid item kind: {s}"))),
        }
    }
}

//--------------------------------------       LineItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: ItemKind,
    /// The id of the ticket, coupon or fee this line refers to. Synthetic fees carry zero.
    pub ref_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub catalog_object_id: Option<String>,
}

impl LineItem {
    pub fn ticket(ticket_id: i64, name: &str, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            kind: ItemKind::Ticket,
            ref_id: ticket_id,
            name: name.to_string(),
            quantity,
            unit_price,
            subtotal: unit_price * Decimal::from(quantity),
            catalog_object_id: None,
        }
    }

    /// A single-quantity line carrying a fixed amount. Negative amounts reduce the order total.
    pub fn fee(ref_id: i64, name: &str, amount: Decimal) -> Self {
        Self {
            kind: ItemKind::Fee,
            ref_id,
            name: name.to_string(),
            quantity: 1,
            unit_price: amount,
            subtotal: amount,
            catalog_object_id: None,
        }
    }

    pub fn coupon(coupon_id: i64, name: &str, discount: Decimal) -> Self {
        Self {
            kind: ItemKind::Coupon,
            ref_id: coupon_id,
            name: name.to_string(),
            quantity: 1,
            unit_price: -discount.abs(),
            subtotal: -discount.abs(),
            catalog_object_id: None,
        }
    }

    pub fn with_catalog_object_id<S: Into<String>>(mut self, id: S) -> Self {
        self.catalog_object_id = Some(id.into());
        self
    }
}

//--------------------------------------     GatewayLinkage     --------------------------------------------------------
/// Changes to an order's gateway linkage that travel together with a status transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLinkage {
    pub gateway_order_id: Option<String>,
    pub original_gateway_order_id: Option<String>,
}

impl GatewayLinkage {
    pub fn is_empty(&self) -> bool {
        self.gateway_order_id.is_none() && self.original_gateway_order_id.is_none()
    }
}

//--------------------------------------      LocalOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOrder {
    pub id: i64,
    pub status: OrderStatusType,
    pub currency: String,
    pub total: Decimal,
    pub subtotal: Decimal,
    pub gateway_order_id: Option<String>,
    pub gateway_order_version: i64,
    pub gateway_customer_id: Option<String>,
    pub original_gateway_order_id: Option<String>,
    pub latest_payload_hash_sent: Option<String>,
    /// The raw body of the last gateway response for this order
    pub gateway_payload: Option<Value>,
    pub payment_ids: BTreeMap<String, DateTime<Utc>>,
    pub refund_ids: BTreeMap<String, DateTime<Utc>>,
    pub on_checkout_hold_until: Option<DateTime<Utc>>,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalOrder {
    pub fn is_on_hold(&self, now: DateTime<Utc>) -> bool {
        self.on_checkout_hold_until.map(|t| now < t).unwrap_or(false)
    }

    /// Adds the given payment ids to the order. Ids already present keep their original timestamp.
    /// Returns true if anything was added.
    pub fn add_payment_ids<'a, I: IntoIterator<Item = &'a str>>(&mut self, ids: I, now: DateTime<Utc>) -> bool {
        merge_ids(&mut self.payment_ids, ids, now)
    }

    pub fn add_refund_ids<'a, I: IntoIterator<Item = &'a str>>(&mut self, ids: I, now: DateTime<Utc>) -> bool {
        merge_ids(&mut self.refund_ids, ids, now)
    }

    pub fn apply_linkage(&mut self, linkage: &GatewayLinkage) {
        if let Some(id) = &linkage.gateway_order_id {
            self.gateway_order_id = Some(id.clone());
        }
        if let Some(id) = &linkage.original_gateway_order_id {
            self.original_gateway_order_id = Some(id.clone());
        }
    }

    pub fn tickets(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(|i| i.kind == ItemKind::Ticket)
    }
}

fn merge_ids<'a, I: IntoIterator<Item = &'a str>>(
    set: &mut BTreeMap<String, DateTime<Utc>>,
    ids: I,
    now: DateTime<Utc>,
) -> bool {
    let mut changed = false;
    for id in ids {
        if !set.contains_key(id) {
            set.insert(id.to_string(), now);
            changed = true;
        }
    }
    changed
}

//--------------------------------------     NewLocalOrder     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocalOrder {
    /// Use this id rather than the next one the store would allocate.
    pub id: Option<i64>,
    pub status: OrderStatusType,
    pub currency: String,
    pub total: Decimal,
    pub subtotal: Decimal,
    pub gateway_customer_id: Option<String>,
    pub gateway_payload: Option<Value>,
    pub payment_ids: BTreeMap<String, DateTime<Utc>>,
    pub on_checkout_hold_until: Option<DateTime<Utc>>,
    pub items: Vec<LineItem>,
}

impl NewLocalOrder {
    /// A pending order whose totals are derived from its items.
    pub fn new(currency: &str, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(|i| i.subtotal).sum::<Decimal>();
        let subtotal = items.iter().filter(|i| i.kind == ItemKind::Ticket).map(|i| i.subtotal).sum::<Decimal>();
        Self {
            id: None,
            status: OrderStatusType::Pending,
            currency: currency.to_string(),
            total,
            subtotal,
            gateway_customer_id: None,
            gateway_payload: None,
            payment_ids: BTreeMap::new(),
            on_checkout_hold_until: None,
            items,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_total(mut self, total: Decimal) -> Self {
        self.total = total;
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = status;
        self
    }

    pub fn with_hold_until(mut self, until: DateTime<Utc>) -> Self {
        self.on_checkout_hold_until = Some(until);
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.gateway_customer_id = Some(customer_id.into());
        self
    }

    /// The stored form of this order once it has been assigned `id`. It is not yet linked to a remote order.
    pub fn into_order(self, id: i64, now: DateTime<Utc>) -> LocalOrder {
        LocalOrder {
            id,
            status: self.status,
            currency: self.currency,
            total: self.total,
            subtotal: self.subtotal,
            gateway_order_id: None,
            gateway_order_version: 0,
            gateway_customer_id: self.gateway_customer_id,
            original_gateway_order_id: None,
            latest_payload_hash_sent: None,
            gateway_payload: self.gateway_payload,
            payment_ids: self.payment_ids,
            refund_ids: BTreeMap::new(),
            on_checkout_hold_until: self.on_checkout_hold_until,
            items: self.items,
            created_at: now,
            updated_at: now,
        }
    }
}

//--------------------------------------     PendingWebhook    ---------------------------------------------------------
/// A status transition that arrived while its order was on checkout hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWebhook {
    pub new_status: OrderStatusType,
    /// The status the order must still have when the entry is applied
    pub old_status: OrderStatusType,
    /// The raw event that produced this entry
    pub metadata: Value,
    pub linkage: GatewayLinkage,
    pub enqueued_at: DateTime<Utc>,
}

//--------------------------------------        Ticket         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub name: String,
    pub catalog_object_id: Option<String>,
    pub price: Decimal,
    /// Total number of tickets on offer. `None` means unlimited.
    pub stock: Option<i64>,
    pub sold: i64,
}

impl Ticket {
    /// The number of tickets still available, or `None` if stock is unlimited.
    pub fn available(&self) -> Option<i64> {
        self.stock.map(|s| (s - self.sold).max(0))
    }
}
