use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec,
    register_int_gauge, Counter, CounterVec, Encoder, Histogram, HistogramVec, IntGauge,
    TextEncoder,
};
use std::time::Duration;

lazy_static! {
    // Kafka consumer metrics
    pub static ref ORDERS_PROCESSED: Counter = register_counter!(
        "order_service_kafka_consumer_orders_processed_total",
        "Total number of successfully processed orders"
    )
    .expect("metric cannot be created");

    pub static ref ORDERS_FAILED: Counter = register_counter!(
        "order_service_kafka_consumer_orders_failed_total",
        "Total number of failed order processing attempts"
    )
    .expect("metric cannot be created");

    pub static ref ORDERS_DLQ: Counter = register_counter!(
        "order_service_kafka_consumer_orders_dlq_total",
        "Total number of orders written to DLQ"
    )
    .expect("metric cannot be created");

    pub static ref COMMIT_ERRORS: Counter = register_counter!(
        "order_service_kafka_consumer_commit_errors_total",
        "Total number of Kafka commit errors"
    )
    .expect("metric cannot be created");

    pub static ref ORDER_PROCESSING_DURATION: Histogram = register_histogram!(
        "order_service_kafka_consumer_order_processing_duration_seconds",
        "Histogram of order processing durations in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    // Cache metrics
    pub static ref CACHE_REQUESTS: CounterVec = register_counter_vec!(
        "order_service_cache_requests_total",
        "Total number of order cache lookups",
        &["status"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_WARMUP_ORDERS: Counter = register_counter!(
        "order_service_cache_warmup_orders_total",
        "Total number of orders loaded into the cache at startup"
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref STORE_RETRIES: CounterVec = register_counter_vec!(
        "order_service_store_retries_total",
        "Total number of retried store operations",
        &["operation"]
    )
    .expect("metric cannot be created");

    // HTTP metrics
    pub static ref HTTP_REQUESTS: CounterVec = register_counter_vec!(
        "order_service_http_requests_total",
        "Total number of HTTP requests processed",
        &["method", "route", "status"]
    )
    .expect("metric cannot be created");

    pub static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "order_service_http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "route", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    pub static ref HTTP_IN_FLIGHT: IntGauge = register_int_gauge!(
        "order_service_http_in_flight_requests",
        "Current number of in-flight HTTP requests"
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Sink for the service's operational counters.
///
/// Injected into the orchestrator and the stream consumer so that tests can run
/// with [`NoopRecorder`] instead of the process-wide Prometheus registry.
pub trait MetricsRecorder: Send + Sync {
    fn order_processed(&self, duration: Duration);
    fn order_failed(&self);
    fn order_dead_lettered(&self);
    fn commit_failed(&self);
    fn cache_lookup(&self, hit: bool);
    fn cache_warmed(&self, count: usize);
    fn store_retry(&self, operation: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusRecorder;

impl MetricsRecorder for PrometheusRecorder {
    fn order_processed(&self, duration: Duration) {
        ORDERS_PROCESSED.inc();
        ORDER_PROCESSING_DURATION.observe(duration.as_secs_f64());
    }

    fn order_failed(&self) {
        ORDERS_FAILED.inc();
    }

    fn order_dead_lettered(&self) {
        ORDERS_DLQ.inc();
    }

    fn commit_failed(&self) {
        COMMIT_ERRORS.inc();
    }

    fn cache_lookup(&self, hit: bool) {
        let status = if hit { "hit" } else { "miss" };
        CACHE_REQUESTS.with_label_values(&[status]).inc();
    }

    fn cache_warmed(&self, count: usize) {
        CACHE_WARMUP_ORDERS.inc_by(count as f64);
    }

    fn store_retry(&self, operation: &str) {
        STORE_RETRIES.with_label_values(&[operation]).inc();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn order_processed(&self, _duration: Duration) {}
    fn order_failed(&self) {}
    fn order_dead_lettered(&self) {}
    fn commit_failed(&self) {}
    fn cache_lookup(&self, _hit: bool) {}
    fn cache_warmed(&self, _count: usize) {}
    fn store_retry(&self, _operation: &str) {}
}

/// Record one finished HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    HTTP_REQUESTS
        .with_label_values(&[method, route, &status])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, route, &status])
        .observe(duration_secs);
}
