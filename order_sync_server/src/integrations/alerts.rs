use futures::future::BoxFuture;
use log::*;
use order_sync_engine::events::{
    EventHandlers,
    EventHooks,
    OrderStatusChangedEvent,
    WebhookRetriesExhaustedEvent,
};

pub const ALERT_EVENT_BUFFER_SIZE: usize = 25;

/// Creates the server's event handlers.
///
/// 1. `OrderStatusChangedEvent` - every transition is written to the log for auditing.
/// 2. `WebhookRetriesExhaustedEvent` - the transitions queued for an order could not be applied. Nothing will retry
///    them, so an operator is alerted at error level and must re-sync the order by hand (`POST /api/sync/{id}`).
pub fn create_alert_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_status_changed(|ev| {
        let OrderStatusChangedEvent { order_id, old_status, new_status, gateway_order_id } = ev;
        info!(
            "🔔️ Order #{order_id} is now {new_status} (was {old_status}). Remote order: {}",
            gateway_order_id.as_deref().unwrap_or("none")
        );
        no_op()
    });
    hooks.on_retries_exhausted(|ev| {
        let WebhookRetriesExhaustedEvent { order_id, retries, at } = ev;
        error!(
            "🚨️ Order #{order_id} still has unapplied gateway updates after {retries} attempts (gave up at {at}). \
             Re-sync the order manually."
        );
        no_op()
    });
    EventHandlers::new(ALERT_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
