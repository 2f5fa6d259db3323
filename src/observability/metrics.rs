use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

/// Prometheus metrics for the storefront
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // HTTP metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_requests_in_flight: GaugeVec,

    // Database metrics
    pub database_operations_total: CounterVec,
    pub database_operation_duration_seconds: HistogramVec,

    // Business metrics
    pub order_operations_total: CounterVec,
    pub webhook_events_total: CounterVec,
    pub emails_sent_total: CounterVec,
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        info!("Initializing Prometheus metrics");

        let http_requests_total = CounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of HTTP requests processed",
            ),
            &["method", "endpoint", "status_code"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "endpoint"],
        )?;

        let http_requests_in_flight = GaugeVec::new(
            Opts::new(
                "http_requests_in_flight",
                "Number of HTTP requests currently being processed",
            ),
            &["method", "endpoint"],
        )?;

        let database_operations_total = CounterVec::new(
            Opts::new(
                "database_operations_total",
                "Total number of database operations",
            ),
            &["operation", "table", "status"],
        )?;

        let database_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "database_operation_duration_seconds",
                "Database operation duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 30.0, 120.0,
            ]),
            &["operation", "table"],
        )?;

        let order_operations_total = CounterVec::new(
            Opts::new(
                "order_operations_total",
                "Total number of order operations",
            ),
            &["operation", "status"],
        )?;

        let webhook_events_total = CounterVec::new(
            Opts::new(
                "webhook_events_total",
                "Payment webhook deliveries by event and outcome",
            ),
            &["event", "outcome"],
        )?;

        let emails_sent_total = CounterVec::new(
            Opts::new("emails_sent_total", "Confirmation emails by delivery status"),
            &["status"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(database_operations_total.clone()))?;
        registry.register(Box::new(database_operation_duration_seconds.clone()))?;
        registry.register(Box::new(order_operations_total.clone()))?;
        registry.register(Box::new(webhook_events_total.clone()))?;
        registry.register(Box::new(emails_sent_total.clone()))?;

        Ok(Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            database_operations_total,
            database_operation_duration_seconds,
            order_operations_total,
            webhook_events_total,
            emails_sent_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status_code: u16,
        duration_seconds: f64,
    ) {
        let status_str = status_code.to_string();

        self.http_requests_total
            .with_label_values(&[method, endpoint, &status_str])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration_seconds);
    }

    pub fn record_database_operation(
        &self,
        operation: &str,
        table: &str,
        success: bool,
        duration_seconds: f64,
    ) {
        self.database_operations_total
            .with_label_values(&[operation, table, status_label(success)])
            .inc();

        self.database_operation_duration_seconds
            .with_label_values(&[operation, table])
            .observe(duration_seconds);
    }

    pub fn record_order_operation(&self, operation: &str, success: bool) {
        self.order_operations_total
            .with_label_values(&[operation, status_label(success)])
            .inc();
    }

    /// `event` is the gateway event name, `outcome` what the service did with it
    pub fn record_webhook_event(&self, event: &str, outcome: &str) {
        self.webhook_events_total
            .with_label_values(&[event, outcome])
            .inc();
    }

    pub fn record_email(&self, success: bool) {
        let status = if success { "sent" } else { "failed" };
        self.emails_sent_total.with_label_values(&[status]).inc();
    }

    pub fn increment_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .inc();
    }

    pub fn decrement_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .dec();
    }
}
