use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{error_response, service_error_to_response, AdminUser, ApiError, ApiJson};
use crate::models::{
    Category, CategoryListResponse, CategoryProductsRequest, CreateCategoryRequest,
    CreateProductRequest, ProductListResponse, ProductResponse,
};
use crate::services::{AuthService, CatalogService};

pub const NO_PRODUCTS_FOUND: &str = "No products found";

#[derive(Clone, FromRef)]
pub struct CatalogState {
    pub catalog: Arc<CatalogService>,
    pub auth: Arc<AuthService>,
}

#[derive(Debug, Serialize)]
pub struct CategoryCreatedResponse {
    pub message: String,
    pub category: Category,
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<CatalogState>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    state
        .catalog
        .list_categories()
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(skip(state, request), fields(admin_id = %admin.user_id))]
pub async fn create_category(
    State(state): State<CatalogState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryCreatedResponse>), ApiError> {
    match state.catalog.create_category(request).await {
        Ok(category) => {
            info!(category_id = %category.id, name = %category.name, "Created category");
            Ok((
                StatusCode::CREATED,
                Json(CategoryCreatedResponse {
                    message: "Category created successfully".to_string(),
                    category,
                }),
            ))
        }
        Err(err) => {
            error!("Failed to create category: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(skip(state, request))]
pub async fn products_by_category(
    State(state): State<CatalogState>,
    ApiJson(request): ApiJson<CategoryProductsRequest>,
) -> Result<Json<ProductListResponse>, ApiError> {
    state
        .catalog
        .products_by_category(&request.category_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// All products; an empty catalog is reported as 404
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<CatalogState>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let response = state
        .catalog
        .list_products()
        .await
        .map_err(service_error_to_response)?;

    if response.products.is_empty() {
        return Err(error_response(StatusCode::NOT_FOUND, NO_PRODUCTS_FOUND));
    }

    Ok(Json(response))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<CatalogState>,
    Path(product_id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    state
        .catalog
        .get_product(&product_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(skip(state, request), fields(admin_id = %admin.user_id))]
pub async fn create_product(
    State(state): State<CatalogState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    match state.catalog.create_product(request).await {
        Ok(product) => {
            info!(product_id = %product.id, "Created product");
            Ok((StatusCode::CREATED, Json(product)))
        }
        Err(err) => {
            error!("Failed to create product: {}", err);
            Err(service_error_to_response(err))
        }
    }
}
