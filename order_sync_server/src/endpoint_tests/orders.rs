use actix_web::{http::StatusCode, test::TestRequest};
use gateway_tools::{GatewayApiError, RemoteOrder};
use order_sync_engine::{
    db_types::{NewLocalOrder, OrderStatusType},
    test_utils::sample_items,
    OrderStore,
};

use super::helpers::{operator_post, TestSystem, API_TOKEN};
use crate::data_objects::{PushResult, SyncResult};

#[actix_web::test]
async fn health_check() {
    let system = TestSystem::new();
    let (status, body) = system.call(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn push_links_the_order() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let order = system.store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(42));
    let (status, body) = system.call(operator_post("/api/orders/42/push")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: PushResult = serde_json::from_str(&body).expect("Unexpected response");
    assert_eq!(result.order_id, order.id);
    let stored = system.store.fetch_order(42).await.unwrap().expect("Order should exist");
    assert_eq!(stored.gateway_order_id.as_deref(), Some(result.remote_order_id.as_str()));
    let remote = system.gateway.order(&result.remote_order_id).expect("Remote order should exist");
    assert_eq!(remote.reference_id.as_deref(), Some("42"));
}

#[actix_web::test]
async fn push_of_unknown_order_is_not_found() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let (status, _) = system.call(operator_post("/api/orders/404/push")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(system.gateway.calculate_calls(), 0);
}

#[actix_web::test]
async fn push_failures_are_reported_as_payment_errors() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    system.store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(7));
    system.gateway.fail_upserts(Some(GatewayApiError::QueryError { status: 500, message: "boom".into() }));
    let (status, body) = system.call(operator_post("/api/orders/7/push")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("problem setting up payment"), "{body}");
    assert!(!body.contains("boom"));
}

#[actix_web::test]
async fn operator_sync_completes_the_order() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    system.store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(42));
    system.gateway.insert_order(RemoteOrder {
        id: "R1".into(),
        version: 3,
        state: "COMPLETED".into(),
        reference_id: Some("42".into()),
        ..Default::default()
    });
    let (status, body) = system.call(operator_post("/api/sync/R1")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: SyncResult = serde_json::from_str(&body).expect("Unexpected response");
    assert_eq!(result.remote_order_id, "R1");
    let order = result.order.expect("Order should have been resolved");
    assert_eq!(order.id, 42);
    assert_eq!(order.status, OrderStatusType::Completed);
    let stored = system.store.fetch_order(42).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Completed);
}

#[actix_web::test]
async fn operator_sync_of_unknown_remote_order_is_a_gateway_error() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let (status, _) = system.call(operator_post("/api/sync/R404")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn operator_endpoints_require_the_token() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    system.store.insert_order(NewLocalOrder::new("USD", sample_items()).with_id(42));
    let (status, _) = system.call(TestRequest::post().uri("/api/orders/42/push")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = system.call(TestRequest::post().uri("/api/sync/R1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let wrong = TestRequest::post().uri("/api/orders/42/push").insert_header(("Authorization", "Bearer not-it"));
    let (status, _) = system.call(wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let basic =
        TestRequest::post().uri("/api/sync/R1").insert_header(("Authorization", format!("Basic {API_TOKEN}")));
    let (status, _) = system.call(basic).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // nothing reached the engine
    assert_eq!(system.gateway.calculate_calls(), 0);
    assert!(system.gateway.upsert_calls().is_empty());
    assert!(system.store.fetch_order(42).await.unwrap().unwrap().gateway_order_id.is_none());
    // health stays open
    let (status, _) = system.call(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
}
