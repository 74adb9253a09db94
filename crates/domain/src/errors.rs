use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Failed to decode order: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid order data: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid payment timestamp: {0}")]
    InvalidTimestamp(i64),
}
