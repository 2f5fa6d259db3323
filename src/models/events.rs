use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Order, OrderStatus};

/// Order lifecycle events published to the event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OrderEventType {
    OrderCreated,
    OrderCompleted,
    OrderFailed,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderEventType::OrderCreated => write!(f, "OrderCreated"),
            OrderEventType::OrderCompleted => write!(f, "OrderCompleted"),
            OrderEventType::OrderFailed => write!(f, "OrderFailed"),
        }
    }
}

/// OpenTelemetry span context data for distributed tracing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanContextData {
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: String,
}

impl Default for SpanContextData {
    fn default() -> Self {
        Self {
            trace_id: "00000000000000000000000000000000".to_string(),
            span_id: "0000000000000000".to_string(),
            trace_flags: "00".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_type: OrderEventType,
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub gateway_order_id: String,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub metadata: HashMap<String, String>,
    pub span_context: SpanContextData,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    fn from_order(
        event_type: OrderEventType,
        order: &Order,
        span_context: SpanContextData,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            "variant_type".to_string(),
            order.variant.variant_type.to_string(),
        );
        metadata.insert("license".to_string(), order.variant.license.to_string());

        Self {
            event_type,
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            product_id: order.product_id.clone(),
            gateway_order_id: order.gateway_order_id.clone(),
            payment_id: order.payment_id.clone(),
            status: order.status,
            amount: order.amount,
            metadata,
            span_context,
            timestamp: Utc::now(),
        }
    }

    pub fn order_created(order: &Order, span_context: SpanContextData) -> Self {
        Self::from_order(OrderEventType::OrderCreated, order, span_context)
    }

    pub fn order_completed(order: &Order, span_context: SpanContextData) -> Self {
        Self::from_order(OrderEventType::OrderCompleted, order, span_context)
    }

    pub fn order_failed(order: &Order, span_context: SpanContextData) -> Self {
        Self::from_order(OrderEventType::OrderFailed, order, span_context)
    }
}

/// EventBridge event payload structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub detail: EventDetail,
    pub resources: Vec<String>,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetail {
    pub event_type: String,
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub gateway_order_id: String,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub metadata: HashMap<String, String>,
    pub span_context: SpanContextData,
}

impl EventPayload {
    pub fn from_event(event: OrderEvent, source: &str) -> Self {
        let resources = vec![format!("order/{}", event.order_id)];
        let detail_type = event.event_type.to_string();
        let time = event.timestamp;

        Self {
            source: source.to_string(),
            detail_type: detail_type.clone(),
            detail: EventDetail {
                event_type: detail_type,
                order_id: event.order_id,
                user_id: event.user_id,
                product_id: event.product_id,
                gateway_order_id: event.gateway_order_id,
                payment_id: event.payment_id,
                status: event.status,
                amount: event.amount,
                metadata: event.metadata,
                span_context: event.span_context,
            },
            resources,
            time,
        }
    }
}

/// Configuration for EventBridge settings
#[derive(Debug, Clone)]
pub struct EventConfig {
    pub event_bus_name: String,
    pub source_name: String,
    pub retry_attempts: u32,
    pub timeout_seconds: u64,
    pub enabled: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            event_bus_name: "default".to_string(),
            source_name: "imageshop.orders".to_string(),
            retry_attempts: 3,
            timeout_seconds: 30,
            enabled: false,
        }
    }
}
