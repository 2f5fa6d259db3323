use crate::models::{EventConfig, EventPayload, OrderEvent, SpanContextData};
use aws_sdk_eventbridge::Client as EventBridgeClient;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum EventEmitterError {
    #[error("EventBridge SDK error: {0}")]
    EventBridgeSdk(
        #[from] SdkError<aws_sdk_eventbridge::operation::put_events::PutEventsError, Response>,
    ),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Event emission disabled")]
    Disabled,
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,
    #[error("Entry rejected by event bus: {code} - {message}")]
    EntryRejected { code: String, message: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Event bus request timed out after {0}s")]
    Timeout(u64),
}

/// Publishes order lifecycle events to EventBridge
#[derive(Clone)]
pub struct EventEmitter {
    client: Arc<EventBridgeClient>,
    config: EventConfig,
}

impl EventEmitter {
    pub fn new(client: EventBridgeClient, config: EventConfig) -> Result<Self, EventEmitterError> {
        if config.event_bus_name.is_empty() {
            return Err(EventEmitterError::InvalidConfig(
                "Event bus name cannot be empty".to_string(),
            ));
        }

        if config.source_name.is_empty() {
            return Err(EventEmitterError::InvalidConfig(
                "Source name cannot be empty".to_string(),
            ));
        }

        if config.retry_attempts == 0 {
            return Err(EventEmitterError::InvalidConfig(
                "Retry attempts must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    #[instrument(skip(self, event), fields(event_type = %event.event_type, order_id = %event.order_id))]
    pub async fn emit_event(&self, event: OrderEvent) -> Result<(), EventEmitterError> {
        if !self.config.enabled {
            return Err(EventEmitterError::Disabled);
        }

        let payload = EventPayload::from_event(event, &self.config.source_name);
        self.emit_with_retry(payload).await
    }

    /// Exponential backoff starting at 100ms
    async fn emit_with_retry(&self, payload: EventPayload) -> Result<(), EventEmitterError> {
        let max_attempts = self.config.retry_attempts;
        let mut attempts = 0;

        loop {
            match self.send_to_eventbridge(&payload).await {
                Ok(()) => {
                    info!(
                        event_type = %payload.detail_type,
                        order_id = %payload.detail.order_id,
                        attempt = attempts + 1,
                        "Event emitted"
                    );
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        error!(
                            event_type = %payload.detail_type,
                            order_id = %payload.detail.order_id,
                            attempts,
                            error = %e,
                            "Giving up on event emission"
                        );
                        return Err(EventEmitterError::MaxRetriesExceeded);
                    }

                    let delay = backoff_delay(attempts);
                    warn!(
                        event_type = %payload.detail_type,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Event emission failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn send_to_eventbridge(&self, payload: &EventPayload) -> Result<(), EventEmitterError> {
        let detail_json = serde_json::to_string(&payload.detail)?;
        let aws_time = aws_smithy_types::DateTime::from_secs(payload.time.timestamp());

        let entry = aws_sdk_eventbridge::types::PutEventsRequestEntry::builder()
            .event_bus_name(&self.config.event_bus_name)
            .source(&payload.source)
            .detail_type(&payload.detail_type)
            .detail(detail_json)
            .time(aws_time)
            .set_resources(Some(payload.resources.clone()))
            .build();

        let response = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.put_events().entries(entry).send(),
        )
        .await
        .map_err(|_| EventEmitterError::Timeout(self.config.timeout_seconds))??;

        for entry in response.entries() {
            if let Some(code) = entry.error_code() {
                return Err(EventEmitterError::EntryRejected {
                    code: code.to_string(),
                    message: entry.error_message().unwrap_or("Unknown error").to_string(),
                });
            }
        }

        Ok(())
    }

    /// Trace context of the current span, zeros when none is active
    pub fn extract_span_context() -> SpanContextData {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let context = tracing::Span::current().context();
        let span = context.span();
        let span_context = span.span_context();

        if span_context.is_valid() {
            SpanContextData {
                trace_id: format!("{:032x}", span_context.trace_id()),
                span_id: format!("{:016x}", span_context.span_id()),
                trace_flags: format!("{:02x}", span_context.trace_flags()),
            }
        } else {
            SpanContextData::default()
        }
    }

    pub fn config(&self) -> &EventConfig {
        &self.config
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100 * 2_u64.pow(attempt.saturating_sub(1).min(10)))
}

/// Fire-and-forget emission used by services; failures never surface to callers
pub(crate) async fn emit_best_effort(emitter: Option<&Arc<EventEmitter>>, event: OrderEvent) {
    let Some(emitter) = emitter else {
        return;
    };

    match emitter.emit_event(event).await {
        Ok(()) | Err(EventEmitterError::Disabled) => {}
        Err(e) => warn!(error = %e, "Order event not published"),
    }
}
