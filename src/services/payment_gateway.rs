use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Errors returned by the payment gateway client
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected request: status={status}, body={body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid gateway configuration: {0}")]
    InvalidConfig(String),
}

/// Order creation request in the gateway's wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrderRequest {
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: HashMap<String, String>,
}

/// Gateway-side order record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payment provider that turns a price into a client-side checkout handle
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: GatewayOrderRequest)
        -> Result<GatewayOrder, GatewayError>;
}

/// Razorpay-compatible Orders API client
pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(
        base_url: &str,
        key_id: &str,
        key_secret: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        if key_id.is_empty() || key_secret.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "Gateway key id and secret are required".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        })
    }

    pub fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.base_url)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(
        skip(self, request),
        fields(
            amount = request.amount,
            currency = %request.currency,
            receipt = %request.receipt,
            otel.kind = "client",
            peer.service = "payment-gateway",
        )
    )]
    async fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(self.orders_url())
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gateway order creation failed");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let order: GatewayOrder = response.json().await?;
        info!(gateway_order_id = %order.id, "Gateway order created");
        Ok(order)
    }
}
