use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::Router;
use messaging::{MessagingError, OrderConsumer};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A long-running topic consumer owned by the application.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn run(&self, shutdown: CancellationToken);
    async fn close(&self) -> Result<(), MessagingError>;
}

#[async_trait]
impl Consumer for OrderConsumer {
    async fn run(&self, shutdown: CancellationToken) {
        OrderConsumer::run(self, shutdown).await
    }

    async fn close(&self) -> Result<(), MessagingError> {
        OrderConsumer::close(self).await
    }
}

/// Running pieces of the service: the HTTP router and the topic consumers.
pub struct Application {
    router: Router,
    consumers: Vec<Arc<dyn Consumer>>,
}

impl Application {
    pub fn new(router: Router, consumers: Vec<Arc<dyn Consumer>>) -> Self {
        Self { router, consumers }
    }

    /// Bind `addr` and [`serve`](Self::serve) on it.
    pub async fn run(
        self,
        addr: &str,
        shutdown: CancellationToken,
        shutdown_timeout: Duration,
    ) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        info!("Order service listening on {}", addr);

        self.serve(listener, shutdown, shutdown_timeout).await
    }

    /// Serve until `shutdown` is cancelled, then stop the server and every
    /// consumer concurrently within `shutdown_timeout`. Each consumer is
    /// closed as soon as its own loop has returned.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
        shutdown_timeout: Duration,
    ) -> Result<()> {
        let Self { router, consumers } = self;

        let mut consumer_tasks = JoinSet::new();
        for consumer in consumers {
            let token = shutdown.clone();
            consumer_tasks.spawn(async move {
                consumer.run(token).await;
                consumer.close().await
            });
        }

        let server_token = shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
        });

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, stopping...");
            }
            joined = &mut server => {
                shutdown.cancel();
                joined.context("HTTP server task panicked")??;
                return Err(anyhow!("HTTP server stopped unexpectedly"));
            }
        }

        let stop_server = async move {
            match server.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("Server error: {}", e);
                    Err(anyhow::Error::new(e).context("HTTP server failed"))
                }
                Err(e) => Err(anyhow::Error::new(e).context("HTTP server task panicked")),
            }
        };

        let stop_consumers = async move {
            let mut first_error = None;
            while let Some(joined) = consumer_tasks.join_next().await {
                let result = match joined {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => {
                        error!("Failed to close consumer: {}", e);
                        anyhow::Error::new(e).context("failed to close consumer")
                    }
                    Err(e) => {
                        error!("Consumer task failed: {}", e);
                        anyhow::Error::new(e).context("consumer task panicked")
                    }
                };
                first_error.get_or_insert(result);
            }
            first_error.map_or(Ok(()), Err)
        };

        let (served, closed) = tokio::time::timeout(shutdown_timeout, async {
            tokio::join!(stop_server, stop_consumers)
        })
        .await
        .map_err(|_| anyhow!("graceful shutdown timed out after {:?}", shutdown_timeout))?;

        served.and(closed)
    }
}
