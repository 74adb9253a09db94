use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{FetchError, IncomingMessage, MessageSource, MessagingError};

/// Kafka consumer for the orders topic with manual offset commits
pub struct KafkaOrderSource {
    consumer: StreamConsumer,
    closed: AtomicBool,
}

impl KafkaOrderSource {
    /// Create a consumer and subscribe it to `topic`
    pub fn new(
        brokers: &str,
        group_id: &str,
        topic: &str,
        session_timeout: Duration,
    ) -> Result<Self, MessagingError> {
        info!(group_id, topic, "Creating Kafka consumer");

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", session_timeout.as_millis().to_string())
            .create()?;

        consumer.subscribe(&[topic])?;

        info!("Kafka consumer created successfully");
        Ok(Self {
            consumer,
            closed: AtomicBool::new(false),
        })
    }
}

fn to_incoming<M: Message>(message: &M) -> IncomingMessage {
    IncomingMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    }
}

#[async_trait]
impl MessageSource for KafkaOrderSource {
    async fn fetch(&self, shutdown: &CancellationToken) -> Result<IncomingMessage, FetchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FetchError::Closed);
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(FetchError::Cancelled),
            received = self.consumer.recv() => {
                let message = received?;
                debug!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "Received message"
                );
                Ok(to_incoming(&message))
            }
        }
    }

    async fn commit(&self, message: &IncomingMessage) -> Result<(), MessagingError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Sync)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), MessagingError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.consumer.unsubscribe();
            info!("Kafka consumer closed");
        }
        Ok(())
    }
}
