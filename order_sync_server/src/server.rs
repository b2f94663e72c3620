use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::GatewayApi;
use log::*;
use order_sync_engine::{
    jobs::{SyncJobWorker, TokioScheduler},
    traits::{OrderStore, RemoteClient, Scheduler},
    SqliteDatabase,
    SyncContext,
};
use sync_common::Secret;

use crate::{
    config::{ServerConfig, WebhookConfig},
    errors::ServerError,
    integrations::alerts::create_alert_event_handlers,
    middleware::{ApiAuthMiddlewareFactory, HmacMiddlewareFactory},
    routes::{health, GatewayWebhookRoute, PushOrderRoute, SyncOrderRoute},
};

pub type ServerContext = SyncContext<SqliteDatabase, GatewayApi, TokioScheduler>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_alert_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let (scheduler, receivers) = TokioScheduler::new();
    let ctx = SyncContext::new(db, gateway, scheduler, config.sync.clone()).with_producers(producers);
    let worker = SyncJobWorker::new(ctx.clone(), receivers);
    tokio::spawn(worker.run());
    info!("🕰️ Sync job worker spawned");
    let srv = create_server_instance(config, ctx)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, ctx: ServerContext) -> Result<Server, ServerError> {
    let webhooks = config.webhooks.clone();
    let api_token = config.api_token.clone();
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("osync::access_log"))
            .configure(|cfg| configure_routes(cfg, ctx.clone(), &webhooks, &api_token))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every route, and the shared state the handlers need, on `cfg`.
///
/// * `GET /health`
/// * `POST /gateway/webhook`, HMAC-checked
/// * `POST /api/orders/{id}/push`, operator token required
/// * `POST /api/sync/{remote_order_id}`, operator token required
pub fn configure_routes<S, C, Q>(
    cfg: &mut web::ServiceConfig,
    ctx: SyncContext<S, C, Q>,
    webhooks: &WebhookConfig,
    api_token: &Secret<String>,
) where
    S: OrderStore + 'static,
    C: RemoteClient + 'static,
    Q: Scheduler + 'static,
{
    let hmac = HmacMiddlewareFactory::new(
        &webhooks.hmac_header,
        webhooks.signature_key.clone(),
        &webhooks.notification_url,
        webhooks.hmac_checks,
    );
    let scheduler = ctx.scheduler().clone();
    let webhook_scope = web::scope("/gateway").wrap(hmac).service(GatewayWebhookRoute::<Q>::new());
    let api_scope = web::scope("/api")
        .wrap(ApiAuthMiddlewareFactory::new(api_token.clone()))
        .service(PushOrderRoute::<S, C, Q>::new())
        .service(SyncOrderRoute::<S, C, Q>::new());
    cfg.app_data(web::Data::new(ctx))
        .app_data(web::Data::new(scheduler))
        .service(health)
        .service(webhook_scope)
        .service(api_scope);
}
