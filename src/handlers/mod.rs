pub mod admin;
pub mod auth;
pub mod catalog;
pub mod cdn;
pub mod json;
pub mod middleware;
pub mod orders;
pub mod status;
pub mod webhook;

pub use auth::{AdminUser, AuthUser};
pub use json::{json_rejection_response, ApiJson};
pub use middleware::*;
pub use status::{health_check, metrics_handler, HealthStatus};

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::models::ServiceError;
use crate::observability::{
    observability_middleware, DatabaseTracingMiddleware, Metrics, OrderTracingMiddleware,
};
use crate::repositories::{table_manager::TableNames, TableManager};
use crate::services::{AuthService, CatalogService, CdnAuthService, OrderService, WebhookService};

pub type ApiError = (StatusCode, Json<Value>);

pub const INTERNAL_ERROR: &str = "Internal server error";

/// `{ "error", "timestamp" }` body used by every failing route
pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({
            "error": message.into(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// Convert ServiceError to HTTP response
pub fn service_error_to_response(err: ServiceError) -> ApiError {
    service_error_with_fallback(err, INTERNAL_ERROR)
}

/// Like [`service_error_to_response`], but upstream and storage failures
/// surface as `fallback` instead of the generic message
pub fn service_error_with_fallback(err: ServiceError, fallback: &str) -> ApiError {
    let (status, message) = match &err {
        ServiceError::ProductNotFound { .. } => (StatusCode::NOT_FOUND, "No Product Found".to_string()),
        ServiceError::CategoryNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::DuplicateCategory { .. }
        | ServiceError::DuplicateEmail { .. }
        | ServiceError::InvalidRequest { .. }
        | ServiceError::ValidationError { .. }
        | ServiceError::InvalidSignature => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::Unauthorized { .. } | ServiceError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, err.to_string())
        }
        ServiceError::Repository { .. }
        | ServiceError::PaymentGateway { .. }
        | ServiceError::Configuration { .. } => {
            error!(error = %err, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, fallback.to_string())
        }
    };

    error_response(status, message)
}

/// Everything the router needs, built once at startup
#[derive(Clone)]
pub struct AppServices {
    pub metrics: Arc<Metrics>,
    pub auth: Arc<AuthService>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub webhooks: Arc<WebhookService>,
    pub cdn: Arc<CdnAuthService>,
    pub table_manager: Arc<TableManager>,
    pub table_names: TableNames,
}

/// Assemble the full application router
pub fn create_app(services: AppServices) -> Router {
    let metrics = services.metrics.clone();

    let auth_state = auth::AuthState {
        auth: services.auth.clone(),
    };

    let catalog_state = catalog::CatalogState {
        catalog: services.catalog.clone(),
        auth: services.auth.clone(),
    };

    let order_state = orders::OrderState {
        orders: services.orders.clone(),
        auth: services.auth.clone(),
        tracing: Arc::new(OrderTracingMiddleware::new(metrics.clone())),
    };

    let webhook_state = webhook::WebhookState {
        webhooks: services.webhooks.clone(),
        metrics: metrics.clone(),
    };

    let cdn_state = cdn::CdnState {
        cdn: services.cdn.clone(),
        auth: services.auth.clone(),
    };

    let admin_state = admin::AdminState {
        auth: services.auth,
        orders: services.orders,
        table_manager: services.table_manager,
        table_names: services.table_names,
        db_tracing: Arc::new(DatabaseTracingMiddleware::new(metrics.clone())),
    };

    let metrics_for_middleware = metrics.clone();

    Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .with_state(auth_state)
        .route(
            "/api/category",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route("/api/category/products", post(catalog::products_by_category))
        .route(
            "/api/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route("/api/products/:id", get(catalog::get_product))
        .with_state(catalog_state)
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/user", get(orders::list_user_orders))
        .with_state(order_state)
        .route("/api/webhook/razorpay", post(webhook::razorpay_webhook))
        .with_state(webhook_state)
        .route("/api/imagekit-auth", get(cdn::imagekit_auth))
        .with_state(cdn_state)
        .route("/api/admin/setup-tables", post(admin::setup_tables))
        .route("/api/admin/orders/stale", get(admin::stale_orders))
        .with_state(admin_state)
        // Layers added last run first
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(axum_middleware::from_fn(cors_middleware))
        .layer(axum_middleware::from_fn(request_validation_middleware))
        .layer(axum_middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
