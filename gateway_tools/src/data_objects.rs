use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_common::MinorUnits;

pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: MinorUnits,
    pub currency: String,
}

//--------------------------------------   Order components   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteLineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_price_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_money: Option<Money>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteDiscount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl RemoteDiscount {
    /// An order-scoped, fixed-amount discount.
    pub fn fixed(name: &str, amount: Money, metadata: Metadata) -> Self {
        Self {
            uid: None,
            name: Some(name.to_string()),
            discount_type: Some("FIXED_AMOUNT".into()),
            amount_money: Some(amount),
            applied_money: None,
            scope: Some("ORDER".into()),
            metadata,
        }
    }

    /// The money actually taken off the order, falling back to the requested amount.
    pub fn effective_money(&self) -> Option<&Money> {
        self.applied_money.as_ref().or(self.amount_money.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteServiceCharge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_phase: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl RemoteServiceCharge {
    pub fn fixed(name: &str, amount: Money, metadata: Metadata) -> Self {
        Self {
            uid: None,
            name: Some(name.to_string()),
            amount_money: Some(amount),
            applied_money: None,
            calculation_phase: Some("TOTAL_PHASE".into()),
            metadata,
        }
    }

    pub fn effective_money(&self) -> Option<&Money> {
        self.applied_money.as_ref().or(self.amount_money.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTax {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `ADDITIVE` or `INCLUSIVE`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub tax_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_money: Option<Money>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl RemoteTax {
    pub fn is_additive(&self) -> bool {
        self.tax_type.as_deref().map(|t| t.eq_ignore_ascii_case("ADDITIVE")).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    pub id: String,
    #[serde(default)]
    pub amount_money: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRefund {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_money: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetAmounts {
    #[serde(default)]
    pub total_money: Money,
    #[serde(default)]
    pub tax_money: Money,
    #[serde(default)]
    pub tip_money: Money,
    #[serde(default)]
    pub service_charge_money: Money,
    #[serde(default)]
    pub discount_money: Money,
}

//--------------------------------------     RemoteOrder      ---------------------------------------------------------
/// The gateway's view of an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub line_items: Vec<RemoteLineItem>,
    #[serde(default)]
    pub discounts: Vec<RemoteDiscount>,
    #[serde(default)]
    pub service_charges: Vec<RemoteServiceCharge>,
    #[serde(default)]
    pub taxes: Vec<RemoteTax>,
    #[serde(default)]
    pub tenders: Vec<Tender>,
    #[serde(default)]
    pub refunds: Vec<RemoteRefund>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_amounts: Option<NetAmounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_money: Option<Money>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteOrder {
    /// The order's reference id, if it is a local order id.
    pub fn local_reference(&self) -> Option<i64> {
        self.reference_id.as_deref().and_then(|r| r.trim().parse::<i64>().ok())
    }

    pub fn currency(&self) -> Option<&str> {
        self.net_amounts
            .as_ref()
            .map(|n| n.total_money.currency.as_str())
            .or(self.total_money.as_ref().map(|m| m.currency.as_str()))
            .filter(|c| !c.is_empty())
    }

    pub fn net_total(&self) -> Option<MinorUnits> {
        self.net_amounts.as_ref().map(|n| n.total_money.amount).or(self.total_money.as_ref().map(|m| m.amount))
    }
}

/// The body sent to the gateway when calculating, creating or updating an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub location_id: String,
    pub reference_id: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default)]
    pub line_items: Vec<RemoteLineItem>,
    #[serde(default)]
    pub discounts: Vec<RemoteDiscount>,
    #[serde(default)]
    pub service_charges: Vec<RemoteServiceCharge>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

/// The result of a dry-run price calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatedOrder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_money: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_amounts: Option<NetAmounts>,
}

impl CalculatedOrder {
    pub fn calculated_total(&self) -> Option<MinorUnits> {
        self.total_money.as_ref().map(|m| m.amount).or(self.net_amounts.as_ref().map(|n| n.total_money.amount))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCustomer {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRefund {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount_money: Money,
}

//--------------------------------------     Webhooks         ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookData {
    #[serde(default, rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub merchant_id: String,
    #[serde(default, rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: WebhookData,
}

impl WebhookEvent {
    /// The remote order this event refers to.
    ///
    /// Order events carry it in `data.object.<order_*>.order_id`, payment and refund events in
    /// `data.object.<payment|refund>.order_id`. Bare order notifications only carry `data.id`.
    pub fn order_id(&self) -> Option<String> {
        let nested = self.data.object.as_object().and_then(|o| {
            o.values().find_map(|v| v.get("order_id").and_then(Value::as_str).map(String::from))
        });
        nested.or_else(|| {
            (self.data.data_type.starts_with("order") && !self.data.id.is_empty()).then(|| self.data.id.clone())
        })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    const ORDER_JSON: &str = r#"{
        "id": "R1",
        "version": 3,
        "state": "COMPLETED",
        "reference_id": "42",
        "location_id": "L1",
        "line_items": [{
            "uid": "a", "name": "General admission", "quantity": "2",
            "base_price_money": {"amount": 500, "currency": "USD"},
            "metadata": {"local_id": "7"}
        }],
        "taxes": [{"uid": "t", "type": "ADDITIVE", "applied_money": {"amount": 80, "currency": "USD"}}],
        "tenders": [{"id": "T1", "amount_money": {"amount": 1080, "currency": "USD"}}],
        "net_amounts": {"total_money": {"amount": 1080, "currency": "USD"}}
    }"#;

    #[test]
    fn deserialize_order() {
        let order: RemoteOrder = serde_json::from_str(ORDER_JSON).unwrap();
        assert_eq!(order.local_reference(), Some(42));
        assert_eq!(order.version, 3);
        assert_eq!(order.line_items[0].metadata.get("local_id").map(String::as_str), Some("7"));
        assert!(order.taxes[0].is_additive());
        assert_eq!(order.tenders[0].amount_money.amount, MinorUnits::from(1080));
        assert_eq!(order.net_total(), Some(MinorUnits::from(1080)));
        assert_eq!(order.currency(), Some("USD"));
        assert!(order.refunds.is_empty());
        // tip and discount money default to zero
        assert!(order.net_amounts.unwrap().tip_money.amount.is_zero());
    }

    #[test]
    fn webhook_order_id() {
        let event = WebhookEvent {
            event_type: "order.updated".into(),
            data: WebhookData {
                data_type: "order_updated".into(),
                id: "R1".into(),
                object: json!({"order_updated": {"order_id": "R1", "state": "COMPLETED", "version": 4}}),
            },
            ..Default::default()
        };
        assert_eq!(event.order_id().as_deref(), Some("R1"));
        let event = WebhookEvent {
            event_type: "refund.updated".into(),
            data: WebhookData {
                data_type: "refund".into(),
                id: "F1".into(),
                object: json!({"refund": {"id": "F1", "order_id": "R9"}}),
            },
            ..Default::default()
        };
        assert_eq!(event.order_id().as_deref(), Some("R9"));
        let event = WebhookEvent::default();
        assert!(event.order_id().is_none());
    }

    #[test]
    fn payload_serialization_is_stable() {
        let mut metadata = Metadata::new();
        metadata.insert("local_kind".into(), "ticket".into());
        metadata.insert("local_id".into(), "7".into());
        let payload = OrderPayload {
            location_id: "L1".into(),
            reference_id: "42".into(),
            state: "OPEN".into(),
            line_items: vec![RemoteLineItem { quantity: "1".into(), metadata, ..Default::default() }],
            ..Default::default()
        };
        let s = serde_json::to_string(&payload).unwrap();
        assert!(s.contains(r#""metadata":{"local_id":"7","local_kind":"ticket"}"#));
        assert!(!s.contains("version"));
    }
}
