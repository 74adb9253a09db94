use anyhow::Result;
use common::config::parse_duration;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::AppConfig;
use futures_util::stream::StreamExt;
use messaging::KafkaProducer;
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use std::time::Duration;
use tracing::{error, info};

mod generator;

struct GeneratorConfig {
    interval: Duration,
    /// 0 publishes until interrupted
    count: u64,
    /// Every N-th message is invalid; 0 disables
    invalid_every: u64,
}

impl GeneratorConfig {
    fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok();
        Self {
            interval: var("GENERATOR_INTERVAL")
                .and_then(|v| parse_duration(&v))
                .unwrap_or(Duration::from_secs(2)),
            count: var("GENERATOR_COUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            invalid_every: var("GENERATOR_INVALID_EVERY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }

    fn is_invalid(&self, sequence: u64) -> bool {
        self.invalid_every > 0 && sequence % self.invalid_every == 0
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();
    config.check()?;
    let generator = GeneratorConfig::from_env();

    init_telemetry(TelemetryConfig::from_env(
        "order-generator",
        config.env,
        &config.log_level,
    ))?;

    info!(
        topic = %config.kafka.topic,
        interval = ?generator.interval,
        count = generator.count,
        invalid_every = generator.invalid_every,
        "Starting order generator"
    );

    let producer = KafkaProducer::new(
        &config.kafka.bootstrap_servers(),
        config.kafka.produce_timeout,
    )?;

    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    let handle = signals.handle();
    let mut ticker = tokio::time::interval(generator.interval);
    let mut sequence: u64 = 0;

    while generator.count == 0 || sequence < generator.count {
        tokio::select! {
            _ = signals.next() => {
                info!("Received shutdown signal, stopping...");
                break;
            }
            _ = ticker.tick() => {}
        }

        sequence += 1;
        let order = {
            let mut rng = rand::thread_rng();
            if generator.is_invalid(sequence) {
                generator::invalid_order(&mut rng)
            } else {
                generator::random_order(&mut rng)
            }
        };

        match producer
            .publish_json(&config.kafka.topic, &order.order_uid, &order)
            .await
        {
            Ok(()) => info!(order_uid = %order.order_uid, sequence, "Order published"),
            Err(e) => error!(order_uid = %order.order_uid, error = %e, "Failed to publish order"),
        }
    }

    handle.close();
    producer.flush()?;
    info!(published = sequence, "Order generator stopped");
    shutdown_telemetry();

    Ok(())
}
