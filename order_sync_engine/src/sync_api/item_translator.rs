//! Bidirectional mapping between local line items and the gateway's line items, discounts, service charges and taxes.
//!
//! Every entry pushed to the gateway carries its local id in `metadata["local_id"]` (and its kind in
//! `metadata["local_kind"]`) so that the reverse mapping can find it again.
use std::collections::HashMap;

use gateway_tools::{
    helpers::parse_quantity,
    Metadata,
    Money,
    RemoteDiscount,
    RemoteLineItem,
    RemoteOrder,
    RemoteServiceCharge,
};
use log::*;
use rust_decimal::Decimal;
use sync_common::{from_minor_units, to_minor_units, MinorUnits, DEFAULT_CURRENCY_CODE};

use crate::{
    db_types::{ItemKind, LineItem, LocalOrder, Ticket},
    sync_api::errors::TranslationError,
    traits::OrderStore,
};

pub const LOCAL_ID_KEY: &str = "local_id";
pub const LOCAL_KIND_KEY: &str = "local_kind";

/// The item sections of a gateway order payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteLineItems {
    pub line_items: Vec<RemoteLineItem>,
    pub discounts: Vec<RemoteDiscount>,
    pub service_charges: Vec<RemoteServiceCharge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedItems {
    pub items: Vec<LineItem>,
    /// Money on remote line items that could not be attributed to a local ticket.
    pub unmatched_money: MinorUnits,
}

impl TranslatedItems {
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|i| i.subtotal).sum()
    }

    pub fn ticket_subtotal(&self) -> Decimal {
        self.items.iter().filter(|i| i.kind == ItemKind::Ticket).map(|i| i.subtotal).sum()
    }
}

pub struct ItemTranslator;

impl ItemTranslator {
    /// Builds the gateway representation of the order's items. Items that translate to nothing (zero quantity or
    /// amount, or an amount that cannot be expressed in the order currency) are left out.
    pub fn to_remote_payload(order: &LocalOrder) -> RemoteLineItems {
        let mut result = RemoteLineItems::default();
        for item in &order.items {
            match item.kind {
                ItemKind::Ticket => {
                    if let Some(li) = ticket_to_line_item(item, &order.currency) {
                        result.line_items.push(li);
                    }
                },
                ItemKind::Coupon => {
                    if let Some(d) = discount_for(item, item.subtotal.abs(), &order.currency) {
                        result.discounts.push(d);
                    }
                },
                ItemKind::Fee if item.subtotal.is_sign_negative() => {
                    if let Some(d) = discount_for(item, item.subtotal.abs(), &order.currency) {
                        result.discounts.push(d);
                    }
                },
                ItemKind::Fee => {
                    if let Some(money) = money_for(item.subtotal, &order.currency) {
                        result.service_charges.push(RemoteServiceCharge::fixed(&item.name, money, metadata_for(item)));
                    }
                },
            }
        }
        result
    }

    /// Builds local line items for a remote order.
    ///
    /// Line items are resolved to tickets by their numeric `local_id`, falling back to the catalog object id.
    /// Unresolvable lines are dropped and their value is reported in `unmatched_money`. Discounts, service charges
    /// and additive taxes become fee items so that the local total reconciles with the remote one.
    pub async fn from_remote_order<S: OrderStore>(
        store: &S,
        remote: &RemoteOrder,
        oversell_protection: bool,
    ) -> Result<TranslatedItems, TranslationError> {
        let currency = remote.currency().unwrap_or(DEFAULT_CURRENCY_CODE).to_string();
        let mut items = Vec::with_capacity(remote.line_items.len());
        let mut unmatched_money = MinorUnits::default();
        let mut requested = HashMap::<i64, i64>::new();
        for line in &remote.line_items {
            let Some(quantity) = parse_quantity(&line.quantity) else {
                warn!("🔁️ Ignoring remote line item with unusable quantity '{}'", line.quantity);
                unmatched_money = add_unmatched(unmatched_money, line, &remote.id)?;
                continue;
            };
            if quantity == 0 {
                continue;
            }
            let Some(ticket) = resolve_ticket(store, line).await? else {
                debug!("🔁️ Remote line item {:?} does not match any local ticket", line.name);
                unmatched_money = add_unmatched(unmatched_money, line, &remote.id)?;
                continue;
            };
            let total_requested = requested.entry(ticket.id).or_default();
            *total_requested += quantity;
            if oversell_protection {
                if let Some(available) = ticket.available() {
                    if *total_requested > available {
                        return Err(TranslationError::InsufficientStock {
                            ticket_id: ticket.id,
                            requested: *total_requested,
                            available,
                        });
                    }
                }
            }
            let unit_price = line
                .base_price_money
                .as_ref()
                .map(|m| from_minor_units(m.amount, &currency))
                .unwrap_or(ticket.price);
            let name = line.name.as_deref().unwrap_or(&ticket.name);
            let mut item = LineItem::ticket(ticket.id, name, quantity, unit_price);
            item.catalog_object_id = line.catalog_object_id.clone().or(ticket.catalog_object_id.clone());
            items.push(item);
        }
        if items.is_empty() {
            return Err(TranslationError::NoRecognizedItems);
        }
        for d in &remote.discounts {
            if let Some(m) = d.effective_money() {
                let amount = -from_minor_units(m.amount.abs(), &currency);
                items.push(LineItem::fee(local_id(&d.metadata), d.name.as_deref().unwrap_or("Discount"), amount));
            }
        }
        for sc in &remote.service_charges {
            if let Some(m) = sc.effective_money() {
                let amount = from_minor_units(m.amount, &currency);
                let name = sc.name.as_deref().unwrap_or("Service charge");
                items.push(LineItem::fee(local_id(&sc.metadata), name, amount));
            }
        }
        for tax in remote.taxes.iter().filter(|t| t.is_additive()) {
            if let Some(m) = &tax.applied_money {
                let amount = from_minor_units(m.amount, &currency);
                items.push(LineItem::fee(local_id(&tax.metadata), tax.name.as_deref().unwrap_or("Tax"), amount));
            }
        }
        if !unmatched_money.is_zero() {
            let id = &remote.id;
            warn!("🔁️ Remote order {id} carries {unmatched_money} that could not be matched to local tickets");
        }
        Ok(TranslatedItems { items, unmatched_money })
    }
}

async fn resolve_ticket<S: OrderStore>(store: &S, line: &RemoteLineItem) -> Result<Option<Ticket>, TranslationError> {
    if let Some(id) = line.metadata.get(LOCAL_ID_KEY).and_then(|s| s.trim().parse::<i64>().ok()) {
        if let Some(ticket) = store.fetch_ticket(id).await? {
            return Ok(Some(ticket));
        }
    }
    match &line.catalog_object_id {
        Some(catalog_id) => Ok(store.fetch_ticket_by_catalog_id(catalog_id).await?),
        None => Ok(None),
    }
}

/// The value of a line item. `None` if it overflows.
fn line_value(line: &RemoteLineItem) -> Option<MinorUnits> {
    if let Some(total) = &line.total_money {
        return Some(total.amount);
    }
    let quantity = parse_quantity(&line.quantity).unwrap_or(1);
    match &line.base_price_money {
        Some(m) => m.amount.checked_mul(quantity),
        None => Some(MinorUnits::default()),
    }
}

fn add_unmatched(total: MinorUnits, line: &RemoteLineItem, remote_id: &str) -> Result<MinorUnits, TranslationError> {
    line_value(line)
        .and_then(|v| total.checked_add(v))
        .ok_or_else(|| TranslationError::AmountOverflow(remote_id.to_string()))
}

fn local_id(metadata: &Metadata) -> i64 {
    metadata.get(LOCAL_ID_KEY).and_then(|s| s.parse::<i64>().ok()).unwrap_or_default()
}

fn metadata_for(item: &LineItem) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(LOCAL_ID_KEY.to_string(), item.ref_id.to_string());
    metadata.insert(LOCAL_KIND_KEY.to_string(), item.kind.slug().to_string());
    metadata
}

fn money_for(amount: Decimal, currency: &str) -> Option<Money> {
    match to_minor_units(amount, currency) {
        Ok(v) if !v.is_zero() => Some(Money { amount: v, currency: currency.to_string() }),
        Ok(_) => None,
        Err(e) => {
            warn!("🔁️ Skipping item. {e}");
            None
        },
    }
}

fn ticket_to_line_item(item: &LineItem, currency: &str) -> Option<RemoteLineItem> {
    if item.quantity <= 0 {
        return None;
    }
    let base_price = match to_minor_units(item.unit_price, currency) {
        Ok(v) => Money { amount: v, currency: currency.to_string() },
        Err(e) => {
            warn!("🔁️ Skipping ticket {}. {e}", item.ref_id);
            return None;
        },
    };
    Some(RemoteLineItem {
        uid: None,
        name: Some(item.name.clone()),
        quantity: item.quantity.to_string(),
        catalog_object_id: item.catalog_object_id.clone(),
        base_price_money: Some(base_price),
        total_money: None,
        metadata: metadata_for(item),
    })
}

fn discount_for(item: &LineItem, amount: Decimal, currency: &str) -> Option<RemoteDiscount> {
    money_for(amount, currency).map(|money| RemoteDiscount::fixed(&item.name, money, metadata_for(item)))
}
