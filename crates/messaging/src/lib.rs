pub mod consumer;
pub mod order_consumer;
pub mod producer;

pub use consumer::KafkaOrderSource;
pub use order_consumer::OrderConsumer;
pub use producer::KafkaProducer;

use async_trait::async_trait;
use domain::Order;
use rdkafka::error::KafkaError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
use mockall::automock;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fetched record, detached from the client that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Message source closed")]
    Closed,

    #[error("Kafka error while fetching: {0}")]
    Kafka(#[from] KafkaError),
}

impl FetchError {
    /// Whether the loop should stop rather than retry.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, FetchError::Cancelled | FetchError::Closed)
    }
}

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to publish to {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: KafkaError,
    },
}

/// Source of order records with explicit offset commits.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next record. Returns [`FetchError::Cancelled`] once
    /// `shutdown` fires.
    async fn fetch(&self, shutdown: &CancellationToken) -> Result<IncomingMessage, FetchError>;

    /// Mark `message` and everything before it in its partition as processed.
    async fn commit(&self, message: &IncomingMessage) -> Result<(), MessagingError>;

    async fn close(&self) -> Result<(), MessagingError>;
}

/// Destination for records that could not be processed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Forward `message` unchanged (key and payload) to `topic`.
    async fn send(&self, topic: &str, message: &IncomingMessage) -> Result<(), MessagingError>;

    async fn close(&self) -> Result<(), MessagingError>;
}

/// Persists a decoded order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderSaver: Send + Sync {
    async fn save_order(&self, order: Order) -> Result<(), BoxError>;
}
