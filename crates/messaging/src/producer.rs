use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{DeadLetterSink, IncomingMessage, MessagingError};

/// Kafka producer used for dead-lettering and for publishing test orders
pub struct KafkaProducer {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaProducer {
    /// Create a new producer. `timeout` bounds both queueing and delivery of
    /// a single record.
    pub fn new(brokers: &str, timeout: Duration) -> Result<Self, MessagingError> {
        info!("Creating Kafka producer for brokers: {}", brokers);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", "all") // Wait for all replicas to acknowledge
            .set("retries", "3") // Retry failed sends
            .create()?;

        Ok(Self { producer, timeout })
    }

    /// Send raw bytes to `topic`
    pub async fn send_bytes(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
    ) -> Result<(), MessagingError> {
        let mut record = FutureRecord::<[u8], [u8]>::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        match self
            .producer
            .send(record, Timeout::After(self.timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(topic, partition, offset, "Message delivered");
                Ok(())
            }
            Err((err, _)) => {
                warn!(topic, error = %err, "Failed to deliver message");
                Err(MessagingError::Publish {
                    topic: topic.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Serialize `value` as JSON and publish it under `key`
    pub async fn publish_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(), MessagingError> {
        let payload = serde_json::to_vec(value)?;
        self.send_bytes(topic, Some(key.as_bytes()), &payload).await
    }

    /// Wait for queued records to be delivered
    pub fn flush(&self) -> Result<(), MessagingError> {
        self.producer.flush(Timeout::After(self.timeout))?;
        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for KafkaProducer {
    async fn send(&self, topic: &str, message: &IncomingMessage) -> Result<(), MessagingError> {
        self.send_bytes(topic, message.key.as_deref(), &message.payload)
            .await
    }

    async fn close(&self) -> Result<(), MessagingError> {
        self.flush()?;
        info!("Kafka producer flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_creation_with_invalid_brokers() {
        // This should succeed (creation doesn't validate connection)
        let result = KafkaProducer::new("", Duration::from_secs(5));
        assert!(result.is_ok());
    }
}
