use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    filter::LevelFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::ObservabilityConfig;

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to initialize OpenTelemetry: {0}")]
    OpenTelemetryInit(#[from] opentelemetry::trace::TraceError),
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Default directives when `RUST_LOG` is not set.
///
/// The crate itself logs at the configured level, the SDKs stay at info.
pub fn default_filter_directives(service_name: &str, log_level: &str) -> String {
    format!(
        "{}={},imageshop_rs={},tower_http=info,aws_sdk_dynamodb=info,aws_config=info,aws_smithy_runtime=info",
        service_name.replace('-', "_"),
        log_level,
        log_level
    )
}

/// Initialize OpenTelemetry tracing and structured logging
pub fn init_observability(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let tracer = init_opentelemetry_tracer(
        &config.service_name,
        &config.service_version,
        config.otlp_endpoint.as_deref(),
    )?;
    let opentelemetry_layer = OpenTelemetryLayer::new(tracer);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        default_filter_directives(&config.service_name, &config.log_level).into()
    });

    if config.enable_json_logging {
        // Span context is carried by the trace_id field from the *_with_trace! macros
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_level(true)
            .with_file(false)
            .with_line_number(false)
            .log_internal_errors(false)
            .with_span_events(FmtSpan::NONE)
            .with_filter(LevelFilter::TRACE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(opentelemetry_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(opentelemetry_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init()
            .map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;
    }

    info!(
        service = %config.service_name,
        version = %config.service_version,
        "Observability initialized"
    );
    Ok(())
}

/// Extract the current trace ID from the active span context
pub fn get_current_trace_id() -> Option<String> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let current_span = tracing::Span::current();
    let context = current_span.context();
    let span = context.span();
    let span_context = span.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

/// Log at info level, tagging the event with the active trace ID
#[macro_export]
macro_rules! info_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::info!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! error_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::error!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::error!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! warn_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::warn!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::warn!($($arg)*);
        }
    };
}

fn service_resource(service_name: &str, service_version: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", service_version.to_string()),
        KeyValue::new("service.namespace", "imageshop"),
        KeyValue::new("cloud.provider", "aws"),
        KeyValue::new("cloud.platform", "aws_container"),
        KeyValue::new("telemetry.sdk.name", "opentelemetry"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ])
}

/// OTLP/gRPC tracer, batch-exported on the tokio runtime
fn init_opentelemetry_tracer(
    service_name: &str,
    service_version: &str,
    otlp_endpoint: Option<&str>,
) -> Result<opentelemetry_sdk::trace::Tracer, ObservabilityError> {
    let endpoint = otlp_endpoint
        .filter(|endpoint| !endpoint.is_empty())
        .unwrap_or(DEFAULT_OTLP_ENDPOINT);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_max_events_per_span(64)
                .with_max_attributes_per_span(16)
                .with_max_links_per_span(16)
                .with_resource(service_resource(service_name, service_version)),
        )
        .with_batch_config(
            trace::BatchConfig::default()
                .with_max_queue_size(2048)
                .with_max_export_batch_size(512)
                .with_max_export_timeout(Duration::from_secs(30))
                .with_scheduled_delay(Duration::from_millis(500)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

/// Flush pending spans, giving up after a few seconds
pub async fn shutdown_observability() {
    info!("Shutting down observability");

    // shutdown_tracer_provider blocks until the batch processor drains
    let shutdown_task = tokio::task::spawn_blocking(global::shutdown_tracer_provider);

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown_task).await {
        Ok(Ok(())) => info!("Observability shutdown completed"),
        Ok(Err(e)) => warn!("Error during observability shutdown: {}", e),
        Err(_) => warn!(
            "Observability shutdown timed out after {:?}",
            SHUTDOWN_TIMEOUT
        ),
    }
}
