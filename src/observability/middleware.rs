use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::{future::Future, sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// First hop of X-Forwarded-For, then X-Real-IP
fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .or_else(|| header_str(headers, "x-real-ip"))
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

/// Request span, HTTP metrics and access log for every route
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let user_agent = header_str(request.headers(), "user-agent")
        .unwrap_or("unknown")
        .to_string();
    let client_ip = client_ip(request.headers());

    // Group by route template so /api/products/:id is one series
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span_name = format!("{} {}", method, endpoint);
    let span = tracing::info_span!(
        target: "imageshop_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %endpoint,
        http.url = %uri,
        http.user_agent = %user_agent,
        client.address = %client_ip,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async {
        metrics.increment_in_flight(&method, &endpoint);

        let trace_id = tracing::Span::current()
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        let response = next.run(request).await;

        let duration = start_time.elapsed();
        let duration_ms = duration.as_millis();
        let status_code = response.status().as_u16();

        let current_span = tracing::Span::current();
        current_span.record("http.response.status_code", status_code);
        current_span.record("http.response_time_ms", duration_ms);

        let otel_context = current_span.context();
        let otel_span = otel_context.span();
        if status_code >= 500 {
            otel_span.set_status(opentelemetry::trace::Status::error("HTTP server error"));
        } else {
            otel_span.set_status(opentelemetry::trace::Status::Ok);
        }

        metrics.record_http_request(&method, &endpoint, status_code, duration.as_secs_f64());
        metrics.decrement_in_flight(&method, &endpoint);

        if status_code >= 500 {
            error!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                client_ip = %client_ip,
                "Request failed"
            );
        } else if status_code >= 400 {
            warn!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                client_ip = %client_ip,
                "Request rejected"
            );
        } else {
            info!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                user_agent = %user_agent,
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Times a storage operation and records it under `database_operations_total`
pub struct DatabaseTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl DatabaseTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    #[instrument(skip_all, fields(operation = %operation, table = %table))]
    pub async fn trace_operation<F, T, E>(
        &self,
        operation: &str,
        table: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();
        let result = future.await;
        let elapsed = start_time.elapsed();

        self.metrics.record_database_operation(
            operation,
            table,
            result.is_ok(),
            elapsed.as_secs_f64(),
        );

        match &result {
            Ok(_) => info!(duration_ms = elapsed.as_millis(), "Database operation completed"),
            Err(error) => error!(
                error = %error,
                duration_ms = elapsed.as_millis(),
                "Database operation failed"
            ),
        }

        result
    }
}

/// Wraps order flows (create, list, webhook) with a span and `order_operations_total`
pub struct OrderTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl OrderTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    #[instrument(skip_all, fields(operation = %operation, user_id = user_id))]
    pub async fn trace_order_operation<F, T, E>(
        &self,
        operation: &str,
        user_id: Option<&str>,
        future: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();
        let result = future.await;

        self.metrics.record_order_operation(operation, result.is_ok());

        if let Err(error) = &result {
            warn!(
                error = %error,
                duration_ms = start_time.elapsed().as_millis(),
                "Order operation failed"
            );
        }

        result
    }
}
