use cache::Cache;
use common::{MetricsRecorder, RetryPolicy};
use domain::Order;
use std::sync::Arc;
use store::{OrderStore, StoreError, TransactionCoordinator};
use tracing::{debug, info, instrument, warn};

use crate::errors::{OrderServiceError, Result};

/// Order write and read paths over the store, the transaction coordinator and
/// the read cache.
pub struct OrderService<S, C> {
    store: Arc<S>,
    coordinator: Arc<C>,
    cache: Arc<dyn Cache>,
    retry: RetryPolicy,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<S, C> OrderService<S, C>
where
    C: TransactionCoordinator,
    S: OrderStore<Tx = C::Tx>,
{
    pub fn new(
        store: Arc<S>,
        coordinator: Arc<C>,
        cache: Arc<dyn Cache>,
        retry: RetryPolicy,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            store,
            coordinator,
            cache,
            retry,
            metrics,
        }
    }

    /// Persist an order with its delivery, payment and items in one
    /// transaction. The whole transaction is retried on any error.
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn save_order(&self, order: &Order) -> Result<()> {
        self.retry
            .run(
                move || {
                    self.coordinator.run(move |tx| async move {
                        self.store.save_order(Some(&tx), order).await?;

                        tokio::try_join!(
                            self.store
                                .save_delivery(Some(&tx), &order.order_uid, &order.delivery),
                            self.store
                                .save_payment(Some(&tx), &order.order_uid, &order.payment),
                            self.store.save_items(Some(&tx), &order.order_uid, &order.items),
                        )?;

                        Ok::<_, OrderServiceError>(())
                    })
                },
                |err| {
                    warn!(error = %err, "Saving order failed, retrying");
                    self.metrics.store_retry("save_order");
                    true
                },
            )
            .await?;

        debug!(items = order.items.len(), "Order saved");
        Ok(())
    }

    /// Cache-aside read. A miss falls through to the store and refreshes the
    /// cache entry; not-found is returned without retrying.
    #[instrument(skip(self))]
    pub async fn get_order_by_id(&self, order_uid: &str) -> Result<Order> {
        if let Some(bytes) = self.cache.get(order_uid) {
            self.metrics.cache_lookup(true);
            return Order::from_bytes(&bytes).map_err(|source| OrderServiceError::InvalidData {
                order_uid: order_uid.to_string(),
                source,
            });
        }
        self.metrics.cache_lookup(false);

        let order = self
            .retry
            .run(
                || self.store.get_order_by_id(None, order_uid),
                |err| self.should_retry(err, "get_order_by_id"),
            )
            .await?;

        match order.to_bytes() {
            Ok(bytes) => self.cache.set(order_uid.to_string(), bytes),
            Err(err) => warn!(error = %err, "Failed to encode order for cache"),
        }

        Ok(order)
    }

    /// Load the `count` most recent orders into the cache. Orders that fail to
    /// encode are skipped. Returns how many were cached.
    #[instrument(skip(self))]
    pub async fn warm_up_cache(&self, count: u32) -> Result<usize> {
        let orders = self
            .retry
            .run(
                || self.store.latest_orders(None, count),
                |err| self.should_retry(err, "latest_orders"),
            )
            .await?;

        let mut cached = 0;
        for order in orders {
            match order.to_bytes() {
                Ok(bytes) => {
                    self.cache.set(order.order_uid, bytes);
                    cached += 1;
                }
                Err(err) => {
                    warn!(order_uid = %order.order_uid, error = %err, "Skipping order during cache warm-up");
                }
            }
        }

        self.metrics.cache_warmed(cached);
        info!(requested = count, cached, "Cache warmed up");
        Ok(cached)
    }

    fn should_retry(&self, err: &StoreError, operation: &'static str) -> bool {
        if err.is_not_found() {
            return false;
        }
        warn!(operation, error = %err, "Store read failed, retrying");
        self.metrics.store_retry(operation);
        true
    }
}
