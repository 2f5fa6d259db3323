use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::models::{
    Order, OrderEvent, OrderStatus, ServiceError, ServiceResult, WebhookEvent, WebhookEventKind,
    WebhookOutcome, MISSING_PRODUCT_NAME,
};
use crate::repositories::{OrderRepository, ProductRepository, UserRepository};
use crate::services::event_emitter::{emit_best_effort, EventEmitter};
use crate::services::mailer::{confirmation_email, Mailer};

type HmacSha256 = Hmac<Sha256>;

/// Delay before a missed gateway-order lookup is retried once
pub const DEFAULT_UNKNOWN_ORDER_RECHECK: Duration = Duration::from_millis(500);

/// Hex-encoded HMAC-SHA256 of `body` under `secret`
pub fn sign_payload(secret: &[u8], body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature over the exact bytes received
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Applies verified payment-gateway callbacks to orders.
///
/// Only this service moves an order out of `pending`, and only through
/// [`OrderRepository::transition_status`], so redelivered or concurrent
/// callbacks for the same payment settle the order exactly once.
pub struct WebhookService {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
    products: Arc<dyn ProductRepository>,
    mailer: Arc<dyn Mailer>,
    webhook_secret: String,
    event_emitter: Option<Arc<EventEmitter>>,
    unknown_order_recheck: Duration,
}

impl WebhookService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
        products: Arc<dyn ProductRepository>,
        mailer: Arc<dyn Mailer>,
        webhook_secret: String,
    ) -> Self {
        Self {
            orders,
            users,
            products,
            mailer,
            webhook_secret,
            event_emitter: None,
            unknown_order_recheck: DEFAULT_UNKNOWN_ORDER_RECHECK,
        }
    }

    pub fn with_unknown_order_recheck(mut self, delay: Duration) -> Self {
        self.unknown_order_recheck = delay;
        self
    }

    pub fn with_event_emitter(mut self, event_emitter: Arc<EventEmitter>) -> Self {
        self.event_emitter = Some(event_emitter);
        self
    }

    /// Verifies, parses and applies one delivery
    #[instrument(skip(self, body, signature), fields(body_len = body.len()))]
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> ServiceResult<WebhookOutcome> {
        let signature = signature.ok_or(ServiceError::InvalidSignature)?;
        if !verify_signature(self.webhook_secret.as_bytes(), body, signature) {
            crate::warn_with_trace!("Rejected webhook with invalid signature");
            return Err(ServiceError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| ServiceError::invalid_request(format!("Invalid webhook payload: {}", e)))?;

        self.apply(event).await
    }

    /// The gateway-order index is eventually consistent, so a callback that
    /// arrives right after the order was written may miss it. One delayed
    /// re-read covers that window; a miss after it is acknowledged as unknown.
    async fn find_order(&self, gateway_order_id: &str) -> ServiceResult<Option<Order>> {
        if let Some(order) = self.orders.find_by_gateway_order_id(gateway_order_id).await? {
            return Ok(Some(order));
        }

        tokio::time::sleep(self.unknown_order_recheck).await;
        Ok(self.orders.find_by_gateway_order_id(gateway_order_id).await?)
    }

    async fn apply(&self, event: WebhookEvent) -> ServiceResult<WebhookOutcome> {
        let target = match event.kind() {
            WebhookEventKind::PaymentCaptured => OrderStatus::Completed,
            WebhookEventKind::PaymentFailed => OrderStatus::Failed,
            WebhookEventKind::Other => {
                crate::info_with_trace!(event = %event.event, "Ignoring webhook event");
                return Ok(WebhookOutcome::Ignored { event: event.event });
            }
        };

        let payment = event
            .payment()
            .ok_or_else(|| ServiceError::invalid_request("Webhook payload has no payment entity"))?;

        let Some(order) = self.find_order(&payment.order_id).await? else {
            crate::warn_with_trace!(gateway_order_id = %payment.order_id, "Webhook for unknown order");
            return Ok(WebhookOutcome::UnknownOrder {
                gateway_order_id: payment.order_id.clone(),
            });
        };

        if order.status.is_final() {
            crate::info_with_trace!(order_id = %order.id, status = %order.status, "Order already settled");
            return Ok(WebhookOutcome::AlreadyProcessed { order_id: order.id });
        }

        let updated = self
            .orders
            .transition_status(
                &order.id,
                OrderStatus::Pending,
                target,
                Some(payment.id.clone()),
            )
            .await?;

        let Some(updated) = updated else {
            crate::info_with_trace!(order_id = %order.id, "Lost race to settle order");
            return Ok(WebhookOutcome::AlreadyProcessed { order_id: order.id });
        };

        let span_context = EventEmitter::extract_span_context();
        match target {
            OrderStatus::Completed => {
                crate::info_with_trace!(order_id = %updated.id, payment_id = %payment.id, "Order completed");
                emit_best_effort(
                    self.event_emitter.as_ref(),
                    OrderEvent::order_completed(&updated, span_context),
                )
                .await;

                let email_sent = self.send_confirmation(&updated).await;
                Ok(WebhookOutcome::Completed {
                    order_id: updated.id,
                    email_sent,
                })
            }
            _ => {
                crate::info_with_trace!(order_id = %updated.id, payment_id = %payment.id, "Order payment failed");
                emit_best_effort(
                    self.event_emitter.as_ref(),
                    OrderEvent::order_failed(&updated, span_context),
                )
                .await;

                Ok(WebhookOutcome::Failed {
                    order_id: updated.id,
                })
            }
        }
    }

    /// Best effort. Lookup or delivery failures are logged and reported as `false`.
    async fn send_confirmation(&self, order: &Order) -> bool {
        let user = match self.users.find_by_id(&order.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(order_id = %order.id, user_id = %order.user_id, "Order owner not found, skipping email");
                return false;
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to load order owner, skipping email");
                return false;
            }
        };

        let product_name = match self.products.find_by_id(&order.product_id).await {
            Ok(Some(product)) => product.name,
            Ok(None) => MISSING_PRODUCT_NAME.to_string(),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to load product for email");
                MISSING_PRODUCT_NAME.to_string()
            }
        };

        let message = confirmation_email(&user.email, order, &product_name);
        match self.mailer.send(message).await {
            Ok(()) => {
                crate::info_with_trace!(order_id = %order.id, "Confirmation email sent");
                true
            }
            Err(e) => {
                crate::error_with_trace!(order_id = %order.id, error = %e, "Confirmation email failed");
                false
            }
        }
    }
}
