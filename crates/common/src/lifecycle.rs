use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("startup task {task} failed: {source}")]
    Failed {
        task: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("startup cancelled")]
    Cancelled,

    #[error("startup task panicked: {0}")]
    Panicked(String),
}

/// A unit of work that must finish before the service accepts traffic.
///
/// Tasks that start background loops spawn them and return once the loop is
/// running. Implementations should stop early when `shutdown` fires.
#[async_trait]
pub trait StartupTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn start(&self, shutdown: CancellationToken) -> Result<(), StartupError>;
}

/// Run every task concurrently and wait for all of them.
///
/// The first failure cancels the siblings and is returned as is.
pub async fn start_all(
    tasks: Vec<Arc<dyn StartupTask>>,
    shutdown: &CancellationToken,
) -> Result<(), StartupError> {
    let group = shutdown.child_token();
    let mut set = JoinSet::new();

    for task in tasks {
        let token = group.clone();
        set.spawn(async move {
            let name = task.name();
            tracing::debug!(task = name, "Starting task");
            let result = task.start(token).await;
            if result.is_ok() {
                tracing::debug!(task = name, "Task started");
            }
            result
        });
    }

    while let Some(joined) = set.join_next().await {
        let outcome = match joined {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(StartupError::Panicked(err.to_string())),
            Err(_) => Err(StartupError::Cancelled),
        };

        if let Err(err) = outcome {
            tracing::error!(error = %err, "Startup failed");
            group.cancel();
            set.abort_all();
            return Err(err);
        }
    }

    if shutdown.is_cancelled() {
        return Err(StartupError::Cancelled);
    }

    Ok(())
}
