use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderStatusChangedEvent, WebhookRetriesExhaustedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub retries_exhausted_producer: Vec<EventProducer<WebhookRetriesExhaustedEvent>>,
}

impl EventProducers {
    pub async fn publish_status_changed(&self, event: OrderStatusChangedEvent) {
        for producer in &self.status_changed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_retries_exhausted(&self, event: WebhookRetriesExhaustedEvent) {
        for producer in &self.retries_exhausted_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_retries_exhausted: Option<EventHandler<WebhookRetriesExhaustedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_retries_exhausted = hooks.on_retries_exhausted.map(|f| EventHandler::new(buffer_size, f));
        Self { on_status_changed, on_retries_exhausted }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_retries_exhausted {
            result.retries_exhausted_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_retries_exhausted {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_retries_exhausted: Option<Handler<WebhookRetriesExhaustedEvent>>,
}

impl EventHooks {
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_retries_exhausted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WebhookRetriesExhaustedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_retries_exhausted = Some(Arc::new(f));
        self
    }
}
