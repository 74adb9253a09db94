use async_trait::async_trait;
use cache::{spawn_janitor, TtlLruCache};
use common::{StartupError, StartupTask};
use std::sync::Arc;
use std::time::Duration;
use store::{OrderStore, TransactionCoordinator};
use tokio_util::sync::CancellationToken;

use crate::OrderService;

/// Starts the background sweep of expired cache entries.
pub struct CacheJanitorTask {
    cache: Arc<TtlLruCache>,
    interval: Duration,
}

impl CacheJanitorTask {
    pub fn new(cache: Arc<TtlLruCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }
}

#[async_trait]
impl StartupTask for CacheJanitorTask {
    fn name(&self) -> &'static str {
        "cache-janitor"
    }

    // The sweep loop outlives startup and exits when `shutdown` fires.
    async fn start(&self, shutdown: CancellationToken) -> Result<(), StartupError> {
        spawn_janitor(self.cache.clone(), self.interval, shutdown);
        Ok(())
    }
}

/// Loads the most recent orders into the cache before traffic is served.
pub struct CacheWarmUpTask<S, C> {
    service: Arc<OrderService<S, C>>,
    count: u32,
}

impl<S, C> CacheWarmUpTask<S, C> {
    pub fn new(service: Arc<OrderService<S, C>>, count: u32) -> Self {
        Self { service, count }
    }
}

#[async_trait]
impl<S, C> StartupTask for CacheWarmUpTask<S, C>
where
    C: TransactionCoordinator + 'static,
    S: OrderStore<Tx = C::Tx> + 'static,
{
    fn name(&self) -> &'static str {
        "cache-warm-up"
    }

    async fn start(&self, shutdown: CancellationToken) -> Result<(), StartupError> {
        tokio::select! {
            _ = shutdown.cancelled() => Err(StartupError::Cancelled),
            result = self.service.warm_up_cache(self.count) => match result {
                Ok(_) => Ok(()),
                Err(err) => Err(StartupError::Failed {
                    task: self.name(),
                    source: Box::new(err),
                }),
            },
        }
    }
}
