use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{service_error_with_fallback, ApiError};
use crate::models::{ServiceError, WebhookAck, WebhookOutcome};
use crate::observability::Metrics;
use crate::services::WebhookService;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
pub const WEBHOOK_FAILED: &str = "Webhook failed";

#[derive(Clone)]
pub struct WebhookState {
    pub webhooks: Arc<WebhookService>,
    pub metrics: Arc<Metrics>,
}

/// Event name for metric labels; the full payload is parsed by the service
#[derive(Deserialize)]
struct EventName {
    event: String,
}

fn event_label(body: &[u8]) -> String {
    serde_json::from_slice::<EventName>(body)
        .map(|e| e.event)
        .unwrap_or_else(|_| "unparsed".to_string())
}

/// Payment gateway callback. The body is taken as raw bytes so the
/// signature is checked against exactly what was sent.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn razorpay_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.webhooks.handle(&body, signature).await {
        Ok(outcome) => {
            state
                .metrics
                .record_webhook_event(&event_label(&body), outcome.label());
            if let WebhookOutcome::Completed { email_sent, .. } = &outcome {
                state.metrics.record_email(*email_sent);
            }

            info!(outcome = %outcome, "Webhook processed");
            Ok(Json(WebhookAck::default()))
        }
        Err(err) => {
            let outcome = match &err {
                ServiceError::InvalidSignature => "invalid_signature",
                ServiceError::InvalidRequest { .. } => "invalid_payload",
                _ => "error",
            };
            state.metrics.record_webhook_event(&event_label(&body), outcome);

            warn!(error = %err, "Webhook rejected");
            Err(service_error_with_fallback(err, WEBHOOK_FAILED))
        }
    }
}
