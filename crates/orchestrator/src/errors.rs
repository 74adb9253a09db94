use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid cached data for order {order_uid}: {source}")]
    InvalidData {
        order_uid: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for OrderServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(order_uid) => OrderServiceError::NotFound(order_uid),
            other => OrderServiceError::Store(other),
        }
    }
}

impl OrderServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrderServiceError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, OrderServiceError>;
