use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{Cache, TtlLruCache};

pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(120);

/// Periodically drop expired entries until `shutdown` is cancelled.
///
/// The first sweep runs one `interval` after spawning.
pub fn spawn_janitor(
    cache: Arc<TtlLruCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = if interval.is_zero() {
        DEFAULT_JANITOR_INTERVAL
    } else {
        interval
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = %interval.as_millis(), "Cache janitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Cache janitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let removed = cache.remove_expired();
                    if removed > 0 {
                        debug!(removed, remaining = cache.len(), "Expired cache entries removed");
                    }
                }
            }
        }
    })
}
