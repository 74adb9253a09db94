pub mod errors;
pub mod order_service;
pub mod startup;

pub use errors::OrderServiceError;
pub use order_service::OrderService;
pub use startup::{CacheJanitorTask, CacheWarmUpTask};

use async_trait::async_trait;
use domain::Order;
use messaging::{BoxError, OrderSaver};
use store::{OrderStore, TransactionCoordinator};

#[async_trait]
impl<S, C> OrderSaver for OrderService<S, C>
where
    C: TransactionCoordinator + 'static,
    S: OrderStore<Tx = C::Tx> + 'static,
{
    async fn save_order(&self, order: Order) -> Result<(), BoxError> {
        OrderService::save_order(self, &order).await?;
        Ok(())
    }
}
