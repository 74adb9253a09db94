use async_trait::async_trait;
use domain::Order;
use orchestrator::{OrderService, OrderServiceError};
use std::sync::Arc;
use store::{OrderStore, TransactionCoordinator};

/// Read side of the order service as seen by the HTTP handlers
#[async_trait]
pub trait OrderReader: Send + Sync {
    async fn get_order_by_id(&self, order_uid: &str) -> Result<Order, OrderServiceError>;
}

#[async_trait]
impl<S, C> OrderReader for OrderService<S, C>
where
    C: TransactionCoordinator + 'static,
    S: OrderStore<Tx = C::Tx> + 'static,
{
    async fn get_order_by_id(&self, order_uid: &str) -> Result<Order, OrderServiceError> {
        OrderService::get_order_by_id(self, order_uid).await
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderReader>,
}

impl AppState {
    pub fn new(orders: Arc<dyn OrderReader>) -> Self {
        Self { orders }
    }
}
