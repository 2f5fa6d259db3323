use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use super::error_response;
use crate::observability::Metrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Liveness only; downstream stores are not probed
#[instrument(name = "health_check")]
pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

#[instrument(name = "metrics_handler", skip(metrics))]
pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            crate::error_with_trace!(error = %e, "Failed to encode metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
                .into_response()
        }
    }
}
