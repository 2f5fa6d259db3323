use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument};

use crate::models::{
    resolve_image_url, to_minor_units, validate_id, AuthenticatedUser, CreateOrderRequest,
    CreateOrderResponse, Order, OrderEvent, ServiceError, ServiceResult, StaleOrdersResponse,
    UserOrderView, UserOrdersResponse, Validate,
};
use crate::repositories::{OrderRepository, ProductRepository};
use crate::services::event_emitter::{emit_best_effort, EventEmitter};
use crate::services::payment_gateway::{GatewayOrderRequest, PaymentGateway};

pub const INVALID_ORDER_REQUEST: &str = "Invalid request";

/// Checkout and order history
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    cdn_url: String,
    stale_after_minutes: i64,
    event_emitter: Option<Arc<EventEmitter>>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
        cdn_url: String,
        stale_after_minutes: i64,
    ) -> Self {
        Self {
            orders,
            products,
            gateway,
            currency,
            cdn_url,
            stale_after_minutes,
            event_emitter: None,
        }
    }

    pub fn with_event_emitter(mut self, event_emitter: Arc<EventEmitter>) -> Self {
        self.event_emitter = Some(event_emitter);
        self
    }

    /// Opens a gateway order for one product variant and records it as pending.
    /// The variant must be one the product lists, at the listed price.
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn create_order(
        &self,
        user: &AuthenticatedUser,
        request: CreateOrderRequest,
    ) -> ServiceResult<CreateOrderResponse> {
        let (product_id, variant) = match (request.product_id, request.variant) {
            (Some(product_id), Some(variant)) if !product_id.trim().is_empty() => {
                (product_id.trim().to_string(), variant)
            }
            _ => return Err(ServiceError::invalid_request(INVALID_ORDER_REQUEST)),
        };
        validate_id("product_id", &product_id)?;
        variant.validate()?;

        let product = self
            .products
            .find_by_id(&product_id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound {
                id: product_id.clone(),
            })?;

        let listed = match product.find_variant(&variant) {
            Some(listed) if listed.price == variant.price => listed.clone(),
            Some(_) => {
                return Err(ServiceError::invalid_request(
                    "Variant price does not match the listed price",
                ))
            }
            None => {
                return Err(ServiceError::invalid_request(
                    "Variant is not offered for this product",
                ))
            }
        };

        let amount = to_minor_units(listed.price)
            .ok_or_else(|| ServiceError::invalid_request("Price cannot be charged"))?;

        let mut notes = HashMap::new();
        notes.insert("productId".to_string(), product.id.clone());

        let gateway_order = self
            .gateway
            .create_order(GatewayOrderRequest {
                amount,
                currency: self.currency.clone(),
                receipt: format!("receipt{}", Utc::now().timestamp_millis()),
                notes,
            })
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product.id, "Gateway order creation failed");
                ServiceError::PaymentGateway {
                    message: e.to_string(),
                }
            })?;

        let order = self
            .orders
            .create(Order::new_pending(
                &user.user_id,
                &product.id,
                listed,
                &gateway_order.id,
            ))
            .await?;

        crate::info_with_trace!(
            order_id = %order.id,
            gateway_order_id = %gateway_order.id,
            amount,
            "Order created"
        );

        emit_best_effort(
            self.event_emitter.as_ref(),
            OrderEvent::order_created(&order, EventEmitter::extract_span_context()),
        )
        .await;

        Ok(CreateOrderResponse {
            order_id: gateway_order.id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
            db_order_id: order.id,
        })
    }

    /// The caller's orders, newest first, each joined with its product
    #[instrument(skip(self))]
    pub async fn list_user_orders(&self, user_id: &str) -> ServiceResult<UserOrdersResponse> {
        let orders = self.orders.find_by_user(user_id).await?;

        let mut products: HashMap<String, Option<(String, String)>> = HashMap::new();
        let mut views = Vec::with_capacity(orders.len());

        for order in orders {
            if !products.contains_key(&order.product_id) {
                let summary = self
                    .products
                    .find_by_id(&order.product_id)
                    .await?
                    .map(|p| (p.name, resolve_image_url(&self.cdn_url, &p.image_url)));
                products.insert(order.product_id.clone(), summary);
            }

            let summary = products.get(&order.product_id).cloned().flatten();
            views.push(UserOrderView::new(order, summary));
        }

        let total_count = views.len();
        Ok(UserOrdersResponse {
            orders: views,
            total_count,
        })
    }

    /// Orders still pending after the window. Read-only.
    #[instrument(skip(self))]
    pub async fn stale_orders(&self, older_than_minutes: Option<i64>) -> ServiceResult<StaleOrdersResponse> {
        let minutes = older_than_minutes.unwrap_or(self.stale_after_minutes);
        if minutes <= 0 {
            return Err(ServiceError::invalid_request(
                "older_than_minutes must be positive",
            ));
        }

        let cutoff = Utc::now() - Duration::minutes(minutes);
        let orders = self.orders.find_pending_before(cutoff).await?;
        let total_count = orders.len();

        if total_count > 0 {
            crate::warn_with_trace!(count = total_count, minutes, "Pending orders past window");
        }

        Ok(StaleOrdersResponse {
            older_than_minutes: minutes,
            orders,
            total_count,
        })
    }
}
