use anyhow::{Context, Result};
use cache::TtlLruCache;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::{
    start_all, AppConfig, MetricsRecorder, PrometheusRecorder, StartupError, StartupTask,
};
use messaging::{KafkaOrderSource, KafkaProducer, OrderConsumer};
use orchestrator::{CacheJanitorTask, CacheWarmUpTask, OrderService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use store::{PgTransactionCoordinator, PostgresOrderStore};
use tokio_util::sync::CancellationToken;

mod app;
mod handlers;
mod routes;
mod signals;
mod state;

use app::{Application, Consumer};
use signals::ShutdownSignal;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();
    config.check()?;

    init_telemetry(TelemetryConfig::from_env(
        "order-service",
        config.env,
        &config.log_level,
    ))?;

    tracing::info!("Starting Order Service...");
    tracing::info!("Configuration:");
    tracing::info!("  Environment: {:?}", config.env);
    tracing::info!("  HTTP: {}", config.http.addr());
    tracing::info!("  Kafka Brokers: {}", config.kafka.bootstrap_servers());
    tracing::info!("  Kafka Topic: {}", config.kafka.topic);
    tracing::info!("  Database: {}:{}/{}", config.database.host, config.database.port, config.database.database);
    tracing::info!("  Cache: capacity {} ttl {:?}", config.cache.capacity, config.cache.ttl);

    // Connect to database
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .max_lifetime(config.database.max_lifetime)
        .connect(&config.database.url())
        .await
        .context("failed to connect to database")?;
    tracing::info!("Database connected successfully");

    let metrics: Arc<dyn MetricsRecorder> = Arc::new(PrometheusRecorder);
    let cache = Arc::new(TtlLruCache::new(config.cache.capacity, config.cache.ttl)?);
    let service = Arc::new(OrderService::new(
        Arc::new(PostgresOrderStore::new(pool.clone())),
        Arc::new(PgTransactionCoordinator::new(pool.clone())),
        cache.clone(),
        config.retry.policy(),
        metrics.clone(),
    ));

    let shutdown = CancellationToken::new();
    let signals = ShutdownSignal::install(shutdown.clone())?;

    let startup: Vec<Arc<dyn StartupTask>> = vec![
        Arc::new(CacheJanitorTask::new(cache.clone(), config.cache.janitor_interval)),
        Arc::new(CacheWarmUpTask::new(service.clone(), config.cache.warmup_count)),
    ];
    match start_all(startup, &shutdown).await {
        Ok(()) => {}
        Err(StartupError::Cancelled) => {
            tracing::info!("Shutdown requested during startup");
            signals.close().await;
            pool.close().await;
            shutdown_telemetry();
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    // Create Kafka consumer and dead-letter producer
    let brokers = config.kafka.bootstrap_servers();
    let source = KafkaOrderSource::new(
        &brokers,
        &config.kafka.group_id,
        &config.kafka.topic,
        config.kafka.session_timeout,
    )?;
    let dead_letters = KafkaProducer::new(&brokers, config.kafka.produce_timeout)?;
    let consumer = OrderConsumer::new(
        Arc::new(source),
        Arc::new(dead_letters),
        service.clone(),
        metrics,
    )
    .with_dlq_suffix(config.kafka.dlq_suffix.clone());

    let router = routes::create_router(AppState::new(service), &config.cors);
    let consumers: Vec<Arc<dyn Consumer>> = vec![Arc::new(consumer)];
    let app = Application::new(router, consumers);

    let result = app
        .run(&config.http.addr(), shutdown, config.shutdown_timeout)
        .await;
    signals.close().await;

    pool.close().await;
    tracing::info!("Order service stopped");

    // Shutdown telemetry gracefully
    shutdown_telemetry();

    result
}
