use common::MetricsRecorder;
use domain::OrderMessage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{BoxError, DeadLetterSink, IncomingMessage, MessageSource, MessagingError, OrderSaver};

const DEFAULT_DLQ_SUFFIX: &str = "-dlq";
const DEFAULT_FETCH_BACKOFF: Duration = Duration::from_secs(1);

/// Outcome of handling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Saved,
    DeadLettered,
    /// Neither saved nor dead-lettered; the offset stays uncommitted.
    Retained,
}

/// Stream consumer: fetch, decode and validate, save, commit.
///
/// Records that fail any step before commit are forwarded to
/// `<topic><dlq_suffix>` and committed once the forward succeeds.
pub struct OrderConsumer {
    source: Arc<dyn MessageSource>,
    dead_letters: Arc<dyn DeadLetterSink>,
    saver: Arc<dyn OrderSaver>,
    metrics: Arc<dyn MetricsRecorder>,
    dlq_suffix: String,
    fetch_backoff: Duration,
}

impl OrderConsumer {
    pub fn new(
        source: Arc<dyn MessageSource>,
        dead_letters: Arc<dyn DeadLetterSink>,
        saver: Arc<dyn OrderSaver>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            source,
            dead_letters,
            saver,
            metrics,
            dlq_suffix: DEFAULT_DLQ_SUFFIX.to_string(),
            fetch_backoff: DEFAULT_FETCH_BACKOFF,
        }
    }

    pub fn with_dlq_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.dlq_suffix = suffix.into();
        self
    }

    /// Pause after a transient fetch error or a failed dead-letter write.
    pub fn with_fetch_backoff(mut self, backoff: Duration) -> Self {
        self.fetch_backoff = backoff;
        self
    }

    /// Consume until `shutdown` is cancelled or the source is closed. A record
    /// already fetched is always handled to completion.
    ///
    /// A retained record is handled again, after `fetch_backoff`, before
    /// anything else is fetched: committing a later offset would also commit
    /// it. On shutdown it is left uncommitted and redelivered on restart.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Order consumer started");

        'fetch: loop {
            let message = match self.source.fetch(&shutdown).await {
                Ok(message) => message,
                Err(err) if err.is_shutdown() => {
                    debug!(reason = %err, "Stopping fetch loop");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "Failed to fetch message");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.fetch_backoff) => continue,
                    }
                }
            };

            let mut attempt = 1u32;
            while self.handle(&message).await == Disposition::Retained {
                warn!(
                    offset = message.offset,
                    attempt, "Message retained, handling it again"
                );
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        warn!(offset = message.offset, "Stopping with message uncommitted");
                        break 'fetch;
                    }
                    _ = tokio::time::sleep(self.fetch_backoff) => {}
                }
                attempt += 1;
            }
        }

        info!("Order consumer stopped");
    }

    pub async fn handle(&self, message: &IncomingMessage) -> Disposition {
        let started = Instant::now();

        let disposition = match self.process(message).await {
            Ok(order_uid) => {
                self.metrics.order_processed(started.elapsed());
                debug!(order_uid = %order_uid, offset = message.offset, "Order saved");
                Disposition::Saved
            }
            Err(err) => {
                self.metrics.order_failed();
                error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %err,
                    "Failed to handle message"
                );

                let dlq_topic = format!("{}{}", message.topic, self.dlq_suffix);
                if let Err(err) = self.dead_letters.send(&dlq_topic, message).await {
                    error!(topic = %dlq_topic, error = %err, "Failed to write message to DLQ");
                    return Disposition::Retained;
                }
                self.metrics.order_dead_lettered();
                warn!(topic = %dlq_topic, offset = message.offset, "Message written to DLQ");
                Disposition::DeadLettered
            }
        };

        if let Err(err) = self.source.commit(message).await {
            self.metrics.commit_failed();
            error!(offset = message.offset, error = %err, "Failed to commit message");
        }

        disposition
    }

    async fn process(&self, message: &IncomingMessage) -> Result<String, BoxError> {
        let order = OrderMessage::decode(&message.payload)?;
        let order_uid = order.order_uid.clone();
        self.saver.save_order(order).await?;
        Ok(order_uid)
    }

    /// Release the source and the dead-letter sink. Both are closed even if
    /// the first fails; the first error wins.
    pub async fn close(&self) -> Result<(), MessagingError> {
        let source = self.source.close().await;
        let dead_letters = self.dead_letters.close().await;
        source.and(dead_letters)
    }
}
