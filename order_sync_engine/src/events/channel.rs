//! Stateless pub-sub channel
//!
//! Each [`EventHandler`] owns the receiving end of a bounded mpsc channel and runs its handler for every event it
//! receives, concurrently. Handlers only see the event itself. Once every [`EventProducer`] has been dropped, the
//! handler waits for in-flight invocations to finish and then exits.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer { sender: self.sender.clone() }
    }

    pub async fn start_handler(self) {
        let Self { mut receiver, sender, handler } = self;
        // Only producers keep the channel open from here on
        drop(sender);
        debug!("📬️ Event handler started");
        let mut in_flight = JoinSet::new();
        while let Some(ev) = receiver.recv().await {
            let handler = Arc::clone(&handler);
            in_flight.spawn(async move { (handler)(ev).await });
            // reap finished invocations so the set does not grow without bound
            while let Some(res) = in_flight.try_join_next() {
                log_join_result(res);
            }
        }
        while let Some(res) = in_flight.join_next().await {
            log_join_result(res);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn log_join_result(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        warn!("📬️ Event handler invocation failed: {e}");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn every_event_is_handled_before_shutdown() {
        let _ = env_logger::try_init();
        let count = Arc::new(AtomicU64::new(0));
        let c2 = count.clone();
        let handler: Handler<u64> = Arc::new(move |v| {
            let count = count.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                count.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(1, handler);
        let p1 = event_handler.subscribe();
        let p2 = event_handler.subscribe();
        tokio::spawn(async move {
            for v in [1, 3, 5, 7, 9] {
                p1.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for v in [0, 2, 4, 6, 8] {
                p2.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(c2.load(Ordering::SeqCst), 45);
    }
}
