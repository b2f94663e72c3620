//! Request handlers.
//!
//! * `/health` is public.
//! * `/gateway/webhook` receives gateway notifications. It only queues work, so it answers quickly no matter how slow
//!   the gateway API is.
//! * `/api/orders/{id}/push` and `/api/sync/{remote_order_id}` run a push or a pull inline and report the result.
//!
//! Handlers run on actix worker threads. Anything slow (storage, gateway calls) must be awaited, never blocked on, or
//! the worker stops serving other requests.
use std::time::Duration;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use gateway_tools::WebhookEvent;
use log::*;
use order_sync_engine::{
    traits::{OrderStore, RemoteClient, Scheduler, SyncJob, DEFAULT_QUEUE},
    PullSyncApi,
    PushSyncApi,
    SyncContext,
};
use serde_json::{json, Value};

use crate::{
    data_objects::{JsonResponse, PushResult, SyncResult},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(gateway_webhook => Post "/webhook" impl Scheduler);
/// Receives order, payment and refund notifications from the payment gateway.
///
/// The notification is never processed inline. The remote order it refers to is queued for a pull, and the gateway
/// always gets a 200 response so that it does not redeliver. The signature has already been checked by the HMAC
/// middleware by the time this handler runs.
pub async fn gateway_webhook<Q: Scheduler>(
    req: HttpRequest,
    body: web::Bytes,
    scheduler: web::Data<Q>,
) -> HttpResponse {
    trace!("📥️ Received webhook request: {}", req.uri());
    let result = match serde_json::from_slice::<Value>(&body) {
        Err(e) => {
            warn!("📥️ Webhook body is not valid JSON. {e}");
            JsonResponse::failure("Invalid JSON body.")
        },
        Ok(raw) => match serde_json::from_value::<WebhookEvent>(raw.clone()) {
            Err(e) => {
                warn!("📥️ Webhook body is not a gateway event. {e}");
                JsonResponse::failure("Unrecognised event.")
            },
            Ok(event) => match event.order_id() {
                Some(remote_order_id) => {
                    info!("📥️ {} event {} for remote order {remote_order_id}", event.event_type, event.event_id);
                    scheduler.schedule_once(Duration::ZERO, DEFAULT_QUEUE, SyncJob::pull(remote_order_id, raw));
                    JsonResponse::success("Event queued.")
                },
                None => {
                    debug!("📥️ {} event {} does not refer to an order. Ignored.", event.event_type, event.event_id);
                    JsonResponse::success("Event ignored.")
                },
            },
        },
    };
    HttpResponse::Ok().json(result)
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(push_order => Post "/orders/{id}/push" impl OrderStore, RemoteClient, Scheduler);
/// Pushes a stored local order to the gateway and returns the remote order id. Checkout calls this before taking
/// payment.
pub async fn push_order<S, C, Q>(
    path: web::Path<i64>,
    ctx: web::Data<SyncContext<S, C, Q>>,
) -> Result<HttpResponse, ServerError>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    let id = path.into_inner();
    debug!("🔄️ POST push order #{id}");
    let order = ctx.store().fetch_order(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {id}")))?;
    let api = PushSyncApi::new(ctx.get_ref().clone());
    let remote_order_id = api.push(&order).await.map_err(|e| {
        warn!("🔄️ Could not push order #{id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(PushResult { order_id: id, remote_order_id }))
}

route!(sync_order => Post "/sync/{remote_order_id}" impl OrderStore, RemoteClient, Scheduler);
/// Pulls a remote order immediately, bypassing the job queue. Operators use this to repair an order by hand.
pub async fn sync_order<S, C, Q>(
    path: web::Path<String>,
    ctx: web::Data<SyncContext<S, C, Q>>,
) -> Result<HttpResponse, ServerError>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    let remote_order_id = path.into_inner();
    debug!("📥️ POST sync remote order {remote_order_id}");
    let api = PullSyncApi::new(ctx.get_ref().clone());
    let event = json!({ "type": "operator.sync", "order_id": remote_order_id });
    let order = api.pull(&remote_order_id, &event).await.map_err(|e| {
        warn!("📥️ Could not sync remote order {remote_order_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(SyncResult { remote_order_id, order }))
}
