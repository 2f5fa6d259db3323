use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{error_response, service_error_to_response, AdminUser, ApiError};
use crate::models::StaleOrdersResponse;
use crate::observability::DatabaseTracingMiddleware;
use crate::repositories::{table_manager::TableNames, TableManager};
use crate::services::{AuthService, OrderService};

#[derive(Clone, FromRef)]
pub struct AdminState {
    pub auth: Arc<AuthService>,
    pub orders: Arc<OrderService>,
    pub table_manager: Arc<TableManager>,
    pub table_names: TableNames,
    pub db_tracing: Arc<DatabaseTracingMiddleware>,
}

#[derive(Debug, Serialize)]
pub struct SetupTablesResponse {
    pub message: String,
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StaleOrdersQuery {
    pub older_than_minutes: Option<i64>,
}

/// Create every DynamoDB table and index the service uses
#[instrument(name = "setup_tables", skip_all, fields(admin_id = %admin.user_id))]
pub async fn setup_tables(
    State(state): State<AdminState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<SetupTablesResponse>, ApiError> {
    let tables = &state.table_names;

    let result = state
        .db_tracing
        .trace_operation(
            "create_tables",
            "all",
            state.table_manager.create_all_tables(tables),
        )
        .await;

    match result {
        Ok(()) => {
            let tables_created = vec![
                tables.products.clone(),
                tables.categories.clone(),
                tables.users.clone(),
                tables.orders.clone(),
            ];
            info!("Successfully created tables: {:?}", tables_created);

            Ok(Json(SetupTablesResponse {
                message: format!("Successfully created {} tables", tables_created.len()),
                tables_created,
                timestamp: chrono::Utc::now().to_rfc3339(),
            }))
        }
        Err(err) => {
            error!("Failed to create tables: {}", err);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create tables",
            ))
        }
    }
}

/// Orders still pending after the window. Reports only; nothing is written.
#[instrument(skip_all, fields(admin_id = %admin.user_id, older_than_minutes = query.older_than_minutes))]
pub async fn stale_orders(
    State(state): State<AdminState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<StaleOrdersQuery>,
) -> Result<Json<StaleOrdersResponse>, ApiError> {
    state
        .orders
        .stale_orders(query.older_than_minutes)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}
