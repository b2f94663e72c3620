use std::{fmt::Debug, sync::Arc};

use crate::{
    events::EventProducers,
    helpers::{Clock, SystemClock},
    sync_api::{config::SyncConfig, remote_cache::RemoteOrderCache},
    traits::{OrderStore, RemoteClient, Scheduler},
};

/// The collaborators shared by every sync API. Cloning is cheap; the cache and configuration are shared.
pub struct SyncContext<S, C, Q> {
    pub(crate) store: S,
    pub(crate) client: C,
    pub(crate) scheduler: Q,
    pub(crate) cache: Arc<RemoteOrderCache<C>>,
    pub(crate) config: Arc<SyncConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) producers: EventProducers,
}

impl<S, C, Q> Debug for SyncContext<S, C, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyncContext ({:?})", self.config)
    }
}

impl<S: Clone, C: Clone, Q: Clone> Clone for SyncContext<S, C, Q> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            client: self.client.clone(),
            scheduler: self.scheduler.clone(),
            cache: Arc::clone(&self.cache),
            config: Arc::clone(&self.config),
            clock: Arc::clone(&self.clock),
            producers: self.producers.clone(),
        }
    }
}

impl<S, C, Q> SyncContext<S, C, Q>
where
    S: OrderStore,
    C: RemoteClient,
    Q: Scheduler,
{
    pub fn new(store: S, client: C, scheduler: Q, config: SyncConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Self::build_cache(&client, &clock, &config);
        Self {
            store,
            client,
            scheduler,
            cache,
            config: Arc::new(config),
            clock,
            producers: EventProducers::default(),
        }
    }

    /// Replaces the clock. The remote cache is rebuilt so that it expires entries against the same clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = Self::build_cache(&self.client, &clock, &self.config);
        self.clock = clock;
        self
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    fn build_cache(client: &C, clock: &Arc<dyn Clock>, config: &SyncConfig) -> Arc<RemoteOrderCache<C>> {
        Arc::new(RemoteOrderCache::new(
            client.clone(),
            Arc::clone(clock),
            config.order_cache_ttl,
            config.customer_cache_ttl,
        ))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn scheduler(&self) -> &Q {
        &self.scheduler
    }

    pub fn cache(&self) -> &RemoteOrderCache<C> {
        &self.cache
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
