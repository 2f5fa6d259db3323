use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Dimensions, License, VariantType};

/// A purchasable size/licence configuration of a product image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVariant {
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    pub license: License,
    /// JSON number on the wire; string input is accepted too
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl ImageVariant {
    pub fn new(variant_type: VariantType, license: License, price: Decimal) -> Self {
        Self {
            variant_type,
            license,
            price,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.variant_type.dimensions()
    }

    /// Same type and licence, ignoring price
    pub fn same_offer(&self, other: &ImageVariant) -> bool {
        self.variant_type == other.variant_type && self.license == other.license
    }
}

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Path relative to the CDN endpoint
    pub image_url: String,
    pub category_id: Option<String>,
    pub variants: Vec<ImageVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request model for creating a product. Every field defaults so that
/// missing fields reach validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub variants: Vec<ImageVariant>,
}

/// Body of `POST /api/category/products`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryProductsRequest {
    #[serde(default, alias = "categoryId")]
    pub category_id: String,
}

/// Product with its image resolved against the CDN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub category_id: Option<String>,
    pub variants: Vec<ImageVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total_count: usize,
}

impl Product {
    pub fn new(request: CreateProductRequest) -> Self {
        let now = Utc::now();
        Self {
            id: format!("P{}", Uuid::new_v4().simple()),
            name: request.name.trim().to_string(),
            description: request.description.trim().to_string(),
            image_url: request.image_url.trim().to_string(),
            category_id: request
                .category_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            variants: request.variants,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the listed variant matching type and licence
    pub fn find_variant(&self, wanted: &ImageVariant) -> Option<&ImageVariant> {
        self.variants.iter().find(|v| v.same_offer(wanted))
    }

    pub fn to_response(&self, cdn_url: &str) -> ProductResponse {
        ProductResponse {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            image_url: resolve_image_url(cdn_url, &self.image_url),
            category_id: self.category_id.clone(),
            variants: self.variants.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Joins a stored image path onto the CDN endpoint. Absolute URLs pass through.
pub fn resolve_image_url(cdn_url: &str, image_path: &str) -> String {
    if image_path.is_empty() {
        return String::new();
    }
    if cdn_url.is_empty()
        || image_path.starts_with("http://")
        || image_path.starts_with("https://")
    {
        return image_path.to_string();
    }

    format!(
        "{}/{}",
        cdn_url.trim_end_matches('/'),
        image_path.trim_start_matches('/')
    )
}
