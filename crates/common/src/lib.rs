pub mod config;
pub mod lifecycle;
pub mod metrics;
pub mod retry;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, Environment};
pub use lifecycle::{start_all, StartupError, StartupTask};
pub use metrics::{MetricsRecorder, NoopRecorder, PrometheusRecorder};
pub use retry::RetryPolicy;
