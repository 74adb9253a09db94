pub mod postgres_order_store;
mod rows;
pub mod transaction;

pub use postgres_order_store::PostgresOrderStore;
pub use transaction::{PgTransaction, PgTransactionCoordinator, TransactionCoordinator, TxHandle};

use async_trait::async_trait;
use domain::{Delivery, Item, Order, Payment};
use thiserror::Error;

/// Persistence for orders and their delivery, payment and item rows.
///
/// Every operation runs inside `tx` when one is given and against the shared
/// pool otherwise. Writes are insert-if-absent, so replaying an order is a
/// no-op.
#[async_trait]
pub trait OrderStore: Send + Sync {
    type Tx: TxHandle;

    /// Insert the order header row.
    async fn save_order(&self, tx: Option<&Self::Tx>, order: &Order) -> Result<(), StoreError>;

    async fn save_delivery(
        &self,
        tx: Option<&Self::Tx>,
        order_uid: &str,
        delivery: &Delivery,
    ) -> Result<(), StoreError>;

    async fn save_payment(
        &self,
        tx: Option<&Self::Tx>,
        order_uid: &str,
        payment: &Payment,
    ) -> Result<(), StoreError>;

    /// Insert all items in one statement. An empty slice is a no-op.
    async fn save_items(
        &self,
        tx: Option<&Self::Tx>,
        order_uid: &str,
        items: &[Item],
    ) -> Result<(), StoreError>;

    /// Load a complete order. Returns [`StoreError::NotFound`] when no order
    /// row exists for `order_uid`.
    async fn get_order_by_id(
        &self,
        tx: Option<&Self::Tx>,
        order_uid: &str,
    ) -> Result<Order, StoreError>;

    /// Up to `limit` orders, newest `date_created` first.
    async fn latest_orders(&self, tx: Option<&Self::Tx>, limit: u32)
        -> Result<Vec<Order>, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Order {order_uid} has no {relation} row")]
    MissingRelation {
        order_uid: String,
        relation: &'static str,
    },

    #[error("Transaction already finished")]
    TransactionFinished,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
