use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Deployment environment, selects the log format among other things.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Stage,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "development" | "dev" => Some(Self::Development),
            "stage" => Some(Self::Stage),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HttpConfig {
    #[validate(length(min = 1, message = "HOST is required"))]
    pub host: String,
    #[validate(range(min = 1, message = "PORT must be between 1 and 65535"))]
    pub port: u16,
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CorsConfig {
    #[validate(length(min = 1, message = "at least one CORS origin is required"))]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct KafkaConfig {
    #[validate(length(min = 1, message = "KAFKA_BROKERS is required"))]
    pub brokers: Vec<String>,
    #[validate(length(min = 1, message = "KAFKA_GROUP_ID is required"))]
    pub group_id: String,
    #[validate(length(min = 1, message = "KAFKA_TOPIC is required"))]
    pub topic: String,
    #[validate(length(min = 1, message = "KAFKA_DLQ_SUFFIX is required"))]
    pub dlq_suffix: String,
    pub session_timeout: Duration,
    pub produce_timeout: Duration,
}

impl KafkaConfig {
    /// Brokers in the comma-separated form librdkafka expects.
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn dlq_topic(&self) -> String {
        format!("{}{}", self.topic, self.dlq_suffix)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "POSTGRES_HOST is required"))]
    pub host: String,
    #[validate(range(min = 1, message = "POSTGRES_PORT must be between 1 and 65535"))]
    pub port: u16,
    #[validate(length(min = 1, message = "POSTGRES_USER is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "POSTGRES_PASSWORD is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "POSTGRES_DB is required"))]
    pub database: String,
    #[validate(custom(function = "validate_ssl_mode"))]
    pub ssl_mode: String,
    #[validate(range(min = 1, message = "POSTGRES_MAX_CONNECTIONS must be at least 1"))]
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    /// Build database URL from configuration
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "orders".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections: 25,
            min_connections: 0,
            max_lifetime: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CacheConfig {
    #[validate(range(min = 1, message = "CACHE_CAPACITY must be positive"))]
    pub capacity: usize,
    #[validate(custom(function = "validate_positive_duration"))]
    pub ttl: Duration,
    #[validate(custom(function = "validate_positive_duration"))]
    pub janitor_interval: Duration,
    pub warmup_count: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RetryConfig {
    #[validate(range(min = 1, message = "RETRY_MAX_ATTEMPTS must be at least 1"))]
    pub max_attempts: u32,
    pub initial_delay: Duration,
    #[validate(range(min = 1.0, message = "RETRY_MULTIPLIER must be at least 1"))]
    pub multiplier: f64,
    pub max_delay: Option<Duration>,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.initial_delay, self.multiplier, self.max_delay)
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    pub env: Environment,
    #[validate(nested)]
    pub http: HttpConfig,
    #[validate(nested)]
    pub cors: CorsConfig,
    #[validate(nested)]
    pub kafka: KafkaConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub cache: CacheConfig,
    #[validate(nested)]
    pub retry: RetryConfig,
    pub shutdown_timeout: Duration,
    pub log_level: String,
}

impl AppConfig {
    /// Read configuration from the process environment, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let db_defaults = DatabaseConfig::default();

        Self {
            env: env
                .string("ENV")
                .and_then(|value| Environment::parse(&value))
                .unwrap_or(Environment::Development),
            http: HttpConfig {
                host: env.string_or("HOST", "0.0.0.0"),
                port: env.parsed_or("PORT", 8080),
            },
            cors: CorsConfig {
                allowed_origins: env.list_or("ALLOWED_CORS_ORIGINS", "http://localhost:3000"),
            },
            kafka: KafkaConfig {
                brokers: env.list_or("KAFKA_BROKERS", "localhost:9092"),
                group_id: env.string_or("KAFKA_GROUP_ID", "order-service"),
                topic: env.string_or("KAFKA_TOPIC", "orders"),
                dlq_suffix: env.string_or("KAFKA_DLQ_SUFFIX", "-dlq"),
                session_timeout: env.duration_or("KAFKA_SESSION_TIMEOUT", Duration::from_secs(30)),
                produce_timeout: env.duration_or("KAFKA_PRODUCE_TIMEOUT", Duration::from_secs(5)),
            },
            database: DatabaseConfig {
                host: env.string_or("POSTGRES_HOST", &db_defaults.host),
                port: env.parsed_or("POSTGRES_PORT", db_defaults.port),
                username: env.string_or("POSTGRES_USER", ""),
                password: env.string_or("POSTGRES_PASSWORD", ""),
                database: env.string_or("POSTGRES_DB", &db_defaults.database),
                ssl_mode: env.string_or("POSTGRES_SSL_MODE", &db_defaults.ssl_mode),
                max_connections: env.parsed_or("POSTGRES_MAX_CONNECTIONS", db_defaults.max_connections),
                min_connections: env.parsed_or("POSTGRES_MIN_CONNECTIONS", db_defaults.min_connections),
                max_lifetime: env.duration_or("POSTGRES_CONN_MAX_LIFETIME", db_defaults.max_lifetime),
            },
            cache: CacheConfig {
                capacity: env.parsed_or("CACHE_CAPACITY", 1000),
                ttl: env.duration_or("CACHE_TTL", Duration::from_secs(10 * 60)),
                janitor_interval: env.duration_or("CACHE_JANITOR_INTERVAL", Duration::from_secs(2 * 60)),
                warmup_count: env.parsed_or("CACHE_WARMUP_COUNT", 100),
            },
            retry: RetryConfig {
                max_attempts: env.parsed_or("RETRY_MAX_ATTEMPTS", 5),
                initial_delay: env.duration_or("RETRY_INITIAL_DELAY", Duration::from_millis(100)),
                multiplier: env.parsed_or("RETRY_MULTIPLIER", 2.0),
                max_delay: env.string("RETRY_MAX_DELAY").and_then(|v| parse_duration(&v)),
            },
            shutdown_timeout: env.duration_or("SHUTDOWN_TIMEOUT", Duration::from_secs(5)),
            log_level: env.string_or("RUST_LOG", "info"),
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    fn string_or(&self, key: &str, fallback: &str) -> String {
        self.string(key).unwrap_or_else(|| fallback.to_string())
    }

    fn list_or(&self, key: &str, fallback: &str) -> Vec<String> {
        self.string_or(key, fallback)
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect()
    }

    fn parsed_or<T: std::str::FromStr>(&self, key: &str, fallback: T) -> T {
        self.string(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(fallback)
    }

    fn duration_or(&self, key: &str, fallback: Duration) -> Duration {
        self.string(key)
            .and_then(|value| parse_duration(&value))
            .unwrap_or(fallback)
    }
}

/// Parse durations such as `250ms`, `30s`, `5m` or `1h`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount * 60)),
        "h" => Some(Duration::from_secs(amount * 60 * 60)),
        _ => None,
    }
}

fn validate_ssl_mode(mode: &str) -> Result<(), ValidationError> {
    match mode {
        "disable" | "prefer" | "require" | "verify-ca" | "verify-full" => Ok(()),
        _ => Err(ValidationError::new("ssl_mode")),
    }
}

fn validate_positive_duration(duration: &Duration) -> Result<(), ValidationError> {
    if duration.is_zero() {
        return Err(ValidationError::new("positive_duration"));
    }
    Ok(())
}
