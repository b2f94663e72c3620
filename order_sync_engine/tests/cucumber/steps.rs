use cucumber::{then, when};
use log::*;
use order_sync_engine::{db_types::OrderStatusType, OrderStore};
use serde_json::json;

use crate::cucumber::SyncWorld;

async fn remote_id_for(world: &SyncWorld, order_id: i64) -> String {
    let order = world.system().db.fetch_order(order_id).await.expect("Error fetching order").expect("No such order");
    order.gateway_order_id.expect("Order is not linked to a remote order")
}

#[when(expr = "order {int} is pushed to the gateway")]
async fn push_order(world: &mut SyncWorld, id: i64) {
    let system = world.system();
    let order = system.db.fetch_order(id).await.expect("Error fetching order").expect("No such order");
    let remote_id = system.push_api().push(&order).await.expect("Push failed");
    info!("🚀️ Order #{id} pushed as {remote_id}");
}

#[when(expr = "order {int} goes on checkout hold for {int} minutes")]
async fn on_hold(world: &mut SyncWorld, id: i64, minutes: i64) {
    let system = world.system();
    let mut order = system.db.fetch_order(id).await.expect("Error fetching order").expect("No such order");
    order.on_checkout_hold_until = Some(system.clock.now() + chrono::Duration::minutes(minutes));
    system.db.save(&order).await.expect("Error saving order");
}

#[when(expr = "the gateway marks the remote order for {int} as {word}")]
async fn mark_remote(world: &mut SyncWorld, id: i64, state: String) {
    let remote_id = remote_id_for(world, id).await;
    world.system().gateway.set_state(&remote_id, &state);
}

#[when(expr = "the gateway takes payment for order {int}")]
async fn take_payment(world: &mut SyncWorld, id: i64) {
    let remote_id = remote_id_for(world, id).await;
    let gateway = &world.system().gateway;
    gateway.add_tender(&remote_id, &format!("{remote_id}-T1"));
    gateway.set_state(&remote_id, "COMPLETED");
}

#[when(expr = "a webhook arrives for order {int}")]
async fn webhook_for_order(world: &mut SyncWorld, id: i64) {
    let remote_id = remote_id_for(world, id).await;
    let event = json!({ "type": "order.updated", "order_id": remote_id });
    world.system().pull_api().pull(&remote_id, &event).await.expect("Pull failed");
}

#[when(expr = "a webhook arrives for remote order {word}")]
async fn webhook_for_remote(world: &mut SyncWorld, remote_id: String) {
    let event = json!({ "type": "order.created", "order_id": remote_id });
    world.system().pull_api().pull(&remote_id, &event).await.expect("Pull failed");
}

#[when(expr = "{int} minutes pass")]
async fn time_passes(world: &mut SyncWorld, minutes: u64) {
    world.system().clock.advance(std::time::Duration::from_secs(minutes * 60));
}

#[when("the scheduled jobs run")]
async fn scheduled_jobs_run(world: &mut SyncWorld) {
    world.system().run_scheduled_jobs().await;
}

#[when(expr = "order {int} is refunded")]
async fn refund_order(world: &mut SyncWorld, id: i64) {
    let system = world.system();
    let mut order = system.db.fetch_order(id).await.expect("Error fetching order").expect("No such order");
    let remote_id = order.gateway_order_id.clone().expect("Order is not linked to a remote order");
    let outcomes = system.refund_api().refund_remote_order(&remote_id, Some(&mut order)).await.expect("Refund failed");
    assert!(outcomes.iter().all(|o| o.is_success()), "Some tenders were not refunded: {outcomes:?}");
}

#[then(expr = "order {int} has status {word}")]
async fn order_status(world: &mut SyncWorld, id: i64, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Invalid status");
    let order = world.system().db.fetch_order(id).await.expect("Error fetching order").expect("No such order");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {int} has {int} pending webhooks")]
async fn pending_webhooks(world: &mut SyncWorld, id: i64, count: usize) {
    let db = &world.system().db;
    let pending = db.take_pending_webhooks(id).await.expect("Error reading pending webhooks");
    assert_eq!(pending.len(), count);
    for entry in &pending {
        db.enqueue_webhook(id, entry).await.expect("Error restoring pending webhook");
    }
}

#[then(expr = "the gateway issued {int} refunds")]
async fn refund_count(world: &mut SyncWorld, count: usize) {
    assert_eq!(world.system().gateway.refunds().len(), count);
}

#[then(expr = "remote order {word} is linked to a local order")]
async fn remote_linked(world: &mut SyncWorld, remote_id: String) {
    let order = world.system().db.find_by_gateway_order_id(&remote_id).await.expect("Error fetching order");
    assert!(order.is_some(), "No local order is linked to {remote_id}");
}

#[then(expr = "remote order {word} is not linked to a local order")]
async fn remote_not_linked(world: &mut SyncWorld, remote_id: String) {
    let order = world.system().db.find_by_gateway_order_id(&remote_id).await.expect("Error fetching order");
    assert!(order.is_none(), "Remote order {remote_id} should not have a local order");
}

#[then(expr = "ticket {int} has sold {int}")]
async fn ticket_sold(world: &mut SyncWorld, id: i64, sold: i64) {
    let ticket = world.system().db.fetch_ticket(id).await.expect("Error fetching ticket").expect("No such ticket");
    assert_eq!(ticket.sold, sold);
}
