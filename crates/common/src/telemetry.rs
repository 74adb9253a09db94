use opentelemetry::global;
use opentelemetry::trace::TraceError;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use thiserror::Error;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

use crate::config::Environment;

const DEFAULT_JAEGER_ENDPOINT: &str = "localhost:6831";

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub environment: Environment,
    pub log_level: String,
    pub jaeger_endpoint: Option<String>,
    pub enable_jaeger: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "order-service".to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            jaeger_endpoint: None,
            enable_jaeger: false,
        }
    }
}

impl TelemetryConfig {
    /// Read the Jaeger switches from the environment.
    pub fn from_env(service_name: &str, environment: Environment, log_level: &str) -> Self {
        Self::from_lookup(service_name, environment, log_level, |key| {
            std::env::var(key).ok()
        })
    }

    pub fn from_lookup<F>(
        service_name: &str,
        environment: Environment,
        log_level: &str,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_name: service_name.to_string(),
            environment,
            log_level: log_level.to_string(),
            jaeger_endpoint: lookup("JAEGER_ENDPOINT").filter(|v| !v.trim().is_empty()),
            enable_jaeger: lookup("ENABLE_JAEGER")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install Jaeger pipeline: {0}")]
    Tracer(#[from] TraceError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Install the global subscriber: an env filter (`RUST_LOG`, else the
/// configured level), a formatter and, when enabled, a Jaeger exporter.
///
/// Production emits JSON lines; every other environment gets the human-readable
/// formatter.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .boxed(),
        Environment::Development | Environment::Stage => tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed(),
    };

    let jaeger_layer = if config.enable_jaeger {
        let endpoint = config
            .jaeger_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_JAEGER_ENDPOINT);
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(&config.service_name)
            .with_endpoint(endpoint)
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(jaeger_layer)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        environment = ?config.environment,
        jaeger = config.enable_jaeger,
        "Telemetry initialized"
    );

    Ok(())
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
