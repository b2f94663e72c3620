use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, App};
use log::debug;
use order_sync_engine::{
    test_utils::{FakeGateway, MemoryOrderStore, RecordingScheduler},
    SyncConfig,
    SyncContext,
};
use sync_common::Secret;

use crate::{config::WebhookConfig, helpers::calculate_hmac, server::configure_routes};

pub const SIGNATURE_KEY: &str = "test-signature-key";
pub const NOTIFICATION_URL: &str = "https://sync.example.com/gateway/webhook";
pub const API_TOKEN: &str = "test-operator-token";

pub type TestContext = SyncContext<MemoryOrderStore, FakeGateway, RecordingScheduler>;

pub struct TestSystem {
    pub store: MemoryOrderStore,
    pub gateway: FakeGateway,
    pub scheduler: RecordingScheduler,
    pub ctx: TestContext,
    pub webhooks: WebhookConfig,
    pub api_token: Secret<String>,
}

impl TestSystem {
    pub fn new() -> Self {
        let store = MemoryOrderStore::default();
        let gateway = FakeGateway::default();
        let scheduler = RecordingScheduler::default();
        let config = SyncConfig { location_id: "L1".into(), ..Default::default() };
        let ctx = SyncContext::new(store.clone(), gateway.clone(), scheduler.clone(), config);
        let webhooks = WebhookConfig {
            signature_key: Secret::new(SIGNATURE_KEY.to_string()),
            notification_url: NOTIFICATION_URL.to_string(),
            ..Default::default()
        };
        let api_token = Secret::new(API_TOKEN.to_string());
        Self { store, gateway, scheduler, ctx, webhooks, api_token }
    }

    /// Sends `req` through the full route configuration. Errors raised by middleware are returned as responses.
    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let ctx = self.ctx.clone();
        let webhooks = self.webhooks.clone();
        let api_token = self.api_token.clone();
        let app = App::new().configure(move |cfg| configure_routes(cfg, ctx, &webhooks, &api_token));
        let service = test::init_service(app).await;
        debug!("Making request");
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = res.into_body().try_into_bytes().unwrap_or_default();
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => (e.as_response_error().status_code(), e.to_string()),
        }
    }
}

pub fn signed_webhook(body: &str) -> TestRequest {
    let signature = calculate_hmac(SIGNATURE_KEY, NOTIFICATION_URL, body.as_bytes());
    TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("x-square-hmacsha256-signature", signature))
        .set_payload(body.to_string())
}

/// An operator request to one of the `/api` endpoints.
pub fn operator_post(uri: &str) -> TestRequest {
    TestRequest::post().uri(uri).insert_header(("Authorization", format!("Bearer {API_TOKEN}")))
}
