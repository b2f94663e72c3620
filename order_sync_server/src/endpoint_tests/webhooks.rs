use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest};
use order_sync_engine::traits::{SyncJob, DEFAULT_QUEUE};
use serde_json::json;

use super::helpers::{signed_webhook, TestSystem, NOTIFICATION_URL, SIGNATURE_KEY};
use crate::{data_objects::JsonResponse, helpers::calculate_hmac};

const ORDER_UPDATED: &str = r#"{
    "merchant_id": "M1",
    "type": "order.updated",
    "event_id": "E1",
    "data": {
        "type": "order_updated",
        "id": "R1",
        "object": { "order_updated": { "order_id": "R1", "state": "COMPLETED", "version": 4 } }
    }
}"#;

fn parse(body: &str) -> JsonResponse {
    serde_json::from_str(body).expect("Response was not a JsonResponse")
}

#[actix_web::test]
async fn signed_order_event_queues_a_pull() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let (status, body) = system.call(signed_webhook(ORDER_UPDATED)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse(&body).success);
    let jobs = system.scheduler.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].delay, Duration::ZERO);
    assert_eq!(jobs[0].queue, DEFAULT_QUEUE);
    match &jobs[0].job {
        SyncJob::PullOrder { remote_order_id, event } => {
            assert_eq!(remote_order_id, "R1");
            assert_eq!(event["event_id"], json!("E1"));
        },
        other => panic!("Unexpected job {other:?}"),
    }
}

#[actix_web::test]
async fn forged_signature_is_rejected() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let req = TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("x-square-hmacsha256-signature", "bm90IGEgc2lnbmF0dXJl"))
        .set_payload(ORDER_UPDATED);
    let (status, _) = system.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(system.scheduler.jobs().is_empty());
}

#[actix_web::test]
async fn missing_signature_is_rejected() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let req = TestRequest::post().uri("/gateway/webhook").set_payload(ORDER_UPDATED);
    let (status, _) = system.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(system.scheduler.jobs().is_empty());
}

#[actix_web::test]
async fn tampered_body_is_rejected() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let signature = calculate_hmac(SIGNATURE_KEY, NOTIFICATION_URL, ORDER_UPDATED.as_bytes());
    let req = TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("x-square-hmacsha256-signature", signature))
        .set_payload(ORDER_UPDATED.replace("R1", "R2"));
    let (status, _) = system.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_events_are_still_acknowledged() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let (status, body) = system.call(signed_webhook("this is not json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!parse(&body).success);
    let (status, body) = system.call(signed_webhook(r#"{"type": 42}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!parse(&body).success);
    assert!(system.scheduler.jobs().is_empty());
}

#[actix_web::test]
async fn events_without_an_order_are_ignored() {
    let _ = env_logger::try_init();
    let system = TestSystem::new();
    let body = r#"{"type": "customer.created", "data": {"type": "customer", "id": "C1", "object": {}}}"#;
    let (status, body) = system.call(signed_webhook(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse(&body).success);
    assert!(system.scheduler.jobs().is_empty());
}

#[actix_web::test]
async fn unsigned_events_pass_when_checks_are_disabled() {
    let _ = env_logger::try_init();
    let mut system = TestSystem::new();
    system.webhooks.hmac_checks = false;
    let req = TestRequest::post().uri("/gateway/webhook").set_payload(ORDER_UPDATED);
    let (status, _) = system.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(system.scheduler.jobs().len(), 1);
}
