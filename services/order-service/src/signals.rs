use futures_util::stream::StreamExt;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels the shared shutdown token on SIGINT/SIGTERM.
///
/// Installed before startup tasks run so that warm-up can be interrupted.
pub struct ShutdownSignal {
    handle: Handle,
    task: JoinHandle<()>,
}

impl ShutdownSignal {
    pub fn install(shutdown: CancellationToken) -> std::io::Result<Self> {
        Self::install_for(&[SIGTERM, SIGINT], shutdown)
    }

    pub fn install_for(signals: &[i32], shutdown: CancellationToken) -> std::io::Result<Self> {
        let mut signals = Signals::new(signals)?;
        let handle = signals.handle();

        let task = tokio::spawn(async move {
            tokio::select! {
                received = signals.next() => {
                    if let Some(signal) = received {
                        info!(signal, "Received shutdown signal, stopping...");
                        shutdown.cancel();
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        });

        Ok(Self { handle, task })
    }

    /// Stop listening and wait for the listener task to finish.
    pub async fn close(self) {
        self.handle.close();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{start_all, StartupError, StartupTask};
    use signal_hook::consts::signal::{SIGALRM, SIGUSR1, SIGUSR2};
    use std::sync::Arc;
    use std::time::Duration;

    /// Startup task that only finishes when cancelled, like a slow warm-up.
    struct BlockingWarmUp;

    #[async_trait]
    impl StartupTask for BlockingWarmUp {
        fn name(&self) -> &'static str {
            "blocking_warm_up"
        }

        async fn start(&self, shutdown: CancellationToken) -> Result<(), StartupError> {
            shutdown.cancelled().await;
            Err(StartupError::Cancelled)
        }
    }

    #[tokio::test]
    async fn test_signal_cancels_shutdown_token() {
        let shutdown = CancellationToken::new();
        let listener = ShutdownSignal::install_for(&[SIGUSR1], shutdown.clone()).unwrap();

        signal_hook::low_level::raise(SIGUSR1).unwrap();

        tokio::time::timeout(Duration::from_secs(5), shutdown.cancelled())
            .await
            .expect("signal should cancel the token");
        listener.close().await;
    }

    #[tokio::test]
    async fn test_close_without_signal_leaves_token_alone() {
        let shutdown = CancellationToken::new();
        let listener = ShutdownSignal::install_for(&[SIGUSR2], shutdown.clone()).unwrap();

        listener.close().await;

        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_interrupts_startup_tasks() {
        let shutdown = CancellationToken::new();
        let listener = ShutdownSignal::install_for(&[SIGALRM], shutdown.clone()).unwrap();

        let tasks: Vec<Arc<dyn StartupTask>> = vec![Arc::new(BlockingWarmUp)];
        let startup = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { start_all(tasks, &shutdown).await }
        });

        signal_hook::low_level::raise(SIGALRM).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), startup)
            .await
            .expect("startup should stop on signal")
            .unwrap();
        assert!(matches!(result, Err(StartupError::Cancelled)));
        listener.close().await;
    }
}
