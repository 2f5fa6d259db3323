use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ImageVariant, OrderStatus};

pub const MISSING_PRODUCT_NAME: &str = "Product is no longer available";

/// Purchase record. `variant` is a snapshot taken at checkout so later
/// catalog edits never change what was paid for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub variant: ImageVariant,
    pub gateway_order_id: String,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new_pending(
        user_id: &str,
        product_id: &str,
        variant: ImageVariant,
        gateway_order_id: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("O{}", Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            amount: variant.price,
            variant,
            gateway_order_id: gateway_order_id.to_string(),
            payment_id: None,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Last six characters of the id, used in customer-facing mail
    pub fn short_id(&self) -> &str {
        let len = self.id.len();
        self.id.get(len.saturating_sub(6)..).unwrap_or(&self.id)
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Converts a major-unit price to gateway minor units, rounding half away
/// from zero. Returns `None` for negative or unrepresentable amounts.
pub fn to_minor_units(price: Decimal) -> Option<i64> {
    if price.is_sign_negative() {
        return None;
    }
    price
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Body of `POST /api/orders`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default, alias = "productId")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub variant: Option<ImageVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    /// Gateway order id used by the client-side checkout
    pub order_id: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub db_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderProductSummary {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// An order joined with the product it refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrderView {
    pub id: String,
    pub product: OrderProductSummary,
    pub variant: ImageVariant,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: OrderStatus,
    pub gateway_order_id: String,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserOrderView {
    /// `product_name` and `image_url` come from the joined product, if it still exists
    pub fn new(order: Order, product: Option<(String, String)>) -> Self {
        let summary = match product {
            Some((name, image_url)) => OrderProductSummary {
                id: order.product_id.clone(),
                name,
                image_url: Some(image_url),
            },
            None => OrderProductSummary {
                id: order.product_id.clone(),
                name: MISSING_PRODUCT_NAME.to_string(),
                image_url: None,
            },
        };

        Self {
            id: order.id,
            product: summary,
            variant: order.variant,
            amount: order.amount,
            status: order.status,
            gateway_order_id: order.gateway_order_id,
            payment_id: order.payment_id,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOrdersResponse {
    pub orders: Vec<UserOrderView>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleOrdersResponse {
    pub older_than_minutes: i64,
    pub orders: Vec<Order>,
    pub total_count: usize,
}
