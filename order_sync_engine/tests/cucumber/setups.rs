use std::str::FromStr;

use cucumber::given;
use gateway_tools::{helpers::money, NetAmounts, RemoteLineItem, RemoteOrder, Tender};
use log::*;
use order_sync_engine::{
    db_types::{LineItem, NewLocalOrder, Ticket},
    sync_api::LOCAL_ID_KEY,
    OrderStore,
};
use rust_decimal::Decimal;

use crate::cucumber::{sync_world::SyncSystem, SyncWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut SyncWorld) {
    let system = SyncSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "ticket {int} {string} priced at {word} with {int} in stock")]
async fn ticket_in_stock(world: &mut SyncWorld, id: i64, name: String, price: String, stock: i64) {
    let ticket = Ticket {
        id,
        name,
        catalog_object_id: Some(format!("CAT-{id}")),
        price: Decimal::from_str(&price).expect("Invalid price"),
        stock: Some(stock),
        sold: 0,
    };
    world.system().db.upsert_ticket(&ticket).await.expect("Error saving ticket");
}

#[given(expr = "a pending local order {int} for {int} tickets of type {int}")]
async fn pending_order(world: &mut SyncWorld, id: i64, quantity: i64, ticket_id: i64) {
    let db = &world.system().db;
    let ticket = db.fetch_ticket(ticket_id).await.expect("Error fetching ticket").expect("No such ticket");
    let item = LineItem::ticket(ticket.id, &ticket.name, quantity, ticket.price);
    let order = NewLocalOrder::new("USD", vec![item]).with_id(id);
    let order = db.insert_order(order).await.expect("Error saving order");
    debug!("🚀️ Created order #{} for {}", order.id, order.total);
}

#[given(expr = "the gateway has a completed walk-in order {word} for {int} tickets of type {int} at {int} cents each")]
async fn walk_in_order(world: &mut SyncWorld, remote_id: String, quantity: i64, ticket_id: i64, unit: i64) {
    let mut line = RemoteLineItem {
        name: Some(format!("Walk-in ticket {ticket_id}")),
        quantity: quantity.to_string(),
        base_price_money: Some(money(unit, "USD")),
        ..Default::default()
    };
    line.metadata.insert(LOCAL_ID_KEY.to_string(), ticket_id.to_string());
    let total = money(unit * quantity, "USD");
    world.system().gateway.insert_order(RemoteOrder {
        id: remote_id.clone(),
        version: 1,
        state: "COMPLETED".into(),
        location_id: "L1".into(),
        line_items: vec![line],
        tenders: vec![Tender { id: format!("{remote_id}-T1"), amount_money: total.clone(), payment_id: None }],
        net_amounts: Some(NetAmounts { total_money: total, ..Default::default() }),
        ..Default::default()
    });
}
