use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    response::Json,
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    json_rejection_response, service_error_to_response, service_error_with_fallback, ApiError,
    AuthUser,
};
use crate::models::{CreateOrderRequest, CreateOrderResponse, UserOrdersResponse};
use crate::observability::OrderTracingMiddleware;
use crate::services::order_service::INVALID_ORDER_REQUEST;
use crate::services::{AuthService, OrderService};

pub const ORDER_CREATION_FAILED: &str = "Failed to create order";

#[derive(Clone, FromRef)]
pub struct OrderState {
    pub orders: Arc<OrderService>,
    pub auth: Arc<AuthService>,
    pub tracing: Arc<OrderTracingMiddleware>,
}

/// Open a gateway order for the caller. A body that does not parse is
/// reported like any other incomplete order request.
#[instrument(skip(state, user, payload), fields(user_id = %user.user_id))]
pub async fn create_order(
    State(state): State<OrderState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| json_rejection_response(rejection, INVALID_ORDER_REQUEST))?;

    state
        .tracing
        .trace_order_operation(
            "create",
            Some(&user.user_id),
            state.orders.create_order(&user, request),
        )
        .await
        .map(Json)
        .map_err(|err| service_error_with_fallback(err, ORDER_CREATION_FAILED))
}

#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_user_orders(
    State(state): State<OrderState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserOrdersResponse>, ApiError> {
    state
        .tracing
        .trace_order_operation(
            "list_user",
            Some(&user.user_id),
            state.orders.list_user_orders(&user.user_id),
        )
        .await
        .map(Json)
        .map_err(service_error_to_response)
}
