use serde::{Deserialize, Serialize};
use std::fmt;

pub const PAYMENT_CAPTURED: &str = "payment.captured";
pub const PAYMENT_FAILED: &str = "payment.failed";

/// Payment gateway webhook envelope. Only the fields the order flow reads
/// are modelled; everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Option<WebhookPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<PaymentWrapper>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentCaptured,
    PaymentFailed,
    Other,
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventKind::PaymentCaptured => PAYMENT_CAPTURED,
            WebhookEventKind::PaymentFailed => PAYMENT_FAILED,
            WebhookEventKind::Other => "other",
        }
    }
}

impl WebhookEvent {
    pub fn kind(&self) -> WebhookEventKind {
        match self.event.as_str() {
            PAYMENT_CAPTURED => WebhookEventKind::PaymentCaptured,
            PAYMENT_FAILED => WebhookEventKind::PaymentFailed,
            _ => WebhookEventKind::Other,
        }
    }

    pub fn payment(&self) -> Option<&PaymentEntity> {
        self.payload
            .as_ref()
            .and_then(|p| p.payment.as_ref())
            .map(|p| &p.entity)
    }
}

/// What processing a webhook delivery did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Order moved pending -> completed
    Completed { order_id: String, email_sent: bool },
    /// Order moved pending -> failed
    Failed { order_id: String },
    /// Order already final; nothing changed
    AlreadyProcessed { order_id: String },
    /// No order for the gateway order id
    UnknownOrder { gateway_order_id: String },
    /// Event type the service does not act on
    Ignored { event: String },
}

impl WebhookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::Completed { .. } => "completed",
            WebhookOutcome::Failed { .. } => "failed",
            WebhookOutcome::AlreadyProcessed { .. } => "already_processed",
            WebhookOutcome::UnknownOrder { .. } => "unknown_order",
            WebhookOutcome::Ignored { .. } => "ignored",
        }
    }
}

impl fmt::Display for WebhookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl Default for WebhookAck {
    fn default() -> Self {
        Self { received: true }
    }
}
