use std::collections::BTreeMap;

use chrono::Utc;
use order_sync_engine::{
    db_types::{GatewayLinkage, LineItem, NewLocalOrder, OrderStatusType, PendingWebhook, Ticket},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderStore,
    SqliteDatabase,
};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};

async fn new_db() -> (String, SqliteDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    (url, db)
}

async fn teardown(url: String, mut db: SqliteDatabase) {
    db.close().await.expect("Error closing database");
    Sqlite::drop_database(&url).await.expect("Error dropping database");
}

fn ticket(id: i64, stock: i64) -> Ticket {
    Ticket {
        id,
        name: format!("Ticket {id}"),
        catalog_object_id: Some(format!("CAT-{id}")),
        price: Decimal::new(500, 2),
        stock: Some(stock),
        sold: 0,
    }
}

fn new_order(ticket_id: i64, quantity: i64) -> NewLocalOrder {
    NewLocalOrder::new("USD", vec![LineItem::ticket(ticket_id, "Ticket", quantity, Decimal::new(500, 2))])
}

fn webhook(old: OrderStatusType, new: OrderStatusType, n: i64) -> PendingWebhook {
    PendingWebhook {
        new_status: new,
        old_status: old,
        metadata: json!({ "n": n }),
        linkage: GatewayLinkage::default(),
        enqueued_at: Utc::now(),
    }
}

#[tokio::test]
async fn orders_round_trip_through_storage() {
    let (url, db) = new_db().await;
    db.upsert_ticket(&ticket(1, 10)).await.unwrap();
    let order = db.insert_order(new_order(1, 2).with_id(42)).await.unwrap();
    assert_eq!(order.id, 42);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.total, Decimal::new(1000, 2));
    assert_eq!(order.items.len(), 1);
    assert!(order.gateway_order_id.is_none());

    let mut linked = order.clone();
    linked.gateway_order_id = Some("RO-1".into());
    linked.original_gateway_order_id = Some("RO-1".into());
    linked.add_payment_ids(["T1"], Utc::now());
    linked.add_refund_ids(["RF1"], Utc::now());
    db.save(&linked).await.unwrap();

    let by_remote = db.find_by_gateway_order_id("RO-1").await.unwrap().expect("Order should be linked");
    assert_eq!(by_remote.id, 42);
    assert!(by_remote.payment_ids.contains_key("T1"));
    let by_refund = db.find_by_refund_id("RF1").await.unwrap().expect("Refund id should resolve");
    assert_eq!(by_refund.id, 42);
    let by_original = db.find_by_original_gateway_order_id("RO-1").await.unwrap().expect("Original should resolve");
    assert_eq!(by_original.id, 42);
    assert!(db.find_by_refund_id("RF2").await.unwrap().is_none());
    teardown(url, db).await;
}

#[tokio::test]
async fn recording_payment_ids_leaves_the_linkage_alone() {
    let (url, db) = new_db().await;
    db.upsert_ticket(&ticket(1, 10)).await.unwrap();
    let before_push = db.insert_order(new_order(1, 1).with_id(7)).await.unwrap();
    let mut pushed = before_push.clone();
    pushed.gateway_order_id = Some("RO-7".into());
    pushed.gateway_order_version = 4;
    pushed.latest_payload_hash_sent = Some("abc123".into());
    db.save(&pushed).await.unwrap();

    // Recording ids from a copy read before the push does not undo the push
    let payments = BTreeMap::from([("T7".to_string(), Utc::now())]);
    db.record_payment_ids(before_push.id, &payments, &BTreeMap::new()).await.unwrap();
    let refunds = BTreeMap::from([("RF7".to_string(), Utc::now())]);
    db.record_payment_ids(before_push.id, &BTreeMap::new(), &refunds).await.unwrap();
    let stored = db.fetch_order(7).await.unwrap().unwrap();
    assert_eq!(stored.gateway_order_id.as_deref(), Some("RO-7"));
    assert_eq!(stored.latest_payload_hash_sent.as_deref(), Some("abc123"));
    assert_eq!(stored.gateway_order_version, 4);
    assert!(stored.payment_ids.contains_key("T7"));
    assert!(stored.refund_ids.contains_key("RF7"));

    // A full save of an older copy never lowers the version
    db.save(&before_push).await.unwrap();
    assert_eq!(db.fetch_order(7).await.unwrap().unwrap().gateway_order_version, 4);
    let missing = db.record_payment_ids(99, &payments, &BTreeMap::new()).await;
    assert!(missing.is_err());
    teardown(url, db).await;
}

#[tokio::test]
async fn compare_and_set_only_moves_from_the_expected_status() {
    let (url, db) = new_db().await;
    db.upsert_ticket(&ticket(1, 10)).await.unwrap();
    let order = db.insert_order(new_order(1, 1)).await.unwrap();
    let linkage = GatewayLinkage { gateway_order_id: Some("RO-9".into()), original_gateway_order_id: None };

    let moved = db
        .compare_and_set_status(order.id, OrderStatusType::Pending, OrderStatusType::Completed, &linkage)
        .await
        .unwrap();
    assert!(moved);
    let stale = db
        .compare_and_set_status(order.id, OrderStatusType::Pending, OrderStatusType::Denied, &GatewayLinkage::default())
        .await
        .unwrap();
    assert!(!stale);

    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.gateway_order_id.as_deref(), Some("RO-9"));
    teardown(url, db).await;
}

#[tokio::test]
async fn create_if_absent_creates_one_order_per_remote_order() {
    let (url, db) = new_db().await;
    db.upsert_ticket(&ticket(3, 10)).await.unwrap();

    let (first, created) = db.create_if_absent("RW-1", new_order(3, 2)).await.unwrap();
    assert!(created);
    assert_eq!(first.gateway_order_id.as_deref(), Some("RW-1"));
    assert_eq!(first.original_gateway_order_id.as_deref(), Some("RW-1"));
    let (second, created) = db.create_if_absent("RW-1", new_order(3, 2)).await.unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);

    let ticket = db.fetch_ticket(3).await.unwrap().unwrap();
    assert_eq!(ticket.sold, 2);
    teardown(url, db).await;
}

#[tokio::test]
async fn pending_webhooks_are_taken_in_order_exactly_once() {
    let (url, db) = new_db().await;
    db.upsert_ticket(&ticket(1, 10)).await.unwrap();
    let order = db.insert_order(new_order(1, 1)).await.unwrap();
    db.enqueue_webhook(order.id, &webhook(OrderStatusType::Pending, OrderStatusType::Completed, 1)).await.unwrap();
    db.enqueue_webhook(order.id, &webhook(OrderStatusType::Completed, OrderStatusType::Refunded, 2)).await.unwrap();

    let taken = db.take_pending_webhooks(order.id).await.unwrap();
    assert_eq!(taken.len(), 2);
    assert_eq!(taken[0].metadata, json!({ "n": 1 }));
    assert_eq!(taken[1].new_status, OrderStatusType::Refunded);
    assert!(db.take_pending_webhooks(order.id).await.unwrap().is_empty());
    teardown(url, db).await;
}

#[tokio::test]
async fn tickets_resolve_by_catalog_id() {
    let (url, db) = new_db().await;
    db.upsert_ticket(&ticket(5, 20)).await.unwrap();
    let found = db.fetch_ticket_by_catalog_id("CAT-5").await.unwrap().expect("Ticket should resolve");
    assert_eq!(found.id, 5);
    assert_eq!(found.available(), Some(20));
    assert!(db.fetch_ticket_by_catalog_id("CAT-6").await.unwrap().is_none());
    teardown(url, db).await;
}
