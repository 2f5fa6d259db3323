use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    Category, CategoryListResponse, CreateCategoryRequest, CreateProductRequest, Product,
    ProductListResponse, ProductResponse, RepositoryError, ServiceError, ServiceResult, Validate,
};
use crate::repositories::{CategoryRepository, ProductRepository};

pub const ALL_FIELDS_REQUIRED: &str = "All fields are required";
pub const CATEGORY_ID_REQUIRED: &str = "categoryId is required";

/// Categories and products. Reads are public, writes are admin-only at the route layer.
pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
    categories: Arc<dyn CategoryRepository>,
    cdn_url: String,
}

impl CatalogService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        categories: Arc<dyn CategoryRepository>,
        cdn_url: String,
    ) -> Self {
        Self {
            products,
            categories,
            cdn_url,
        }
    }

    pub fn cdn_url(&self) -> &str {
        &self.cdn_url
    }

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> ServiceResult<CategoryListResponse> {
        let categories = self.categories.find_all().await?;
        let total_count = categories.len();

        Ok(CategoryListResponse {
            categories,
            total_count,
        })
    }

    /// Names are unique. The index lookup answers the common case; the
    /// conditional write of the name guard settles concurrent creations.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_category(&self, request: CreateCategoryRequest) -> ServiceResult<Category> {
        request.validate()?;

        if self.categories.find_by_name(&request.name).await?.is_some() {
            return Err(ServiceError::DuplicateCategory { name: request.name });
        }

        let category = match self.categories.create(Category::new(&request.name)).await {
            Ok(category) => category,
            Err(RepositoryError::ConditionFailed) => {
                return Err(ServiceError::DuplicateCategory { name: request.name })
            }
            Err(e) => return Err(e.into()),
        };
        crate::info_with_trace!(category_id = %category.id, "Category created");
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn products_by_category(&self, category_id: &str) -> ServiceResult<ProductListResponse> {
        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err(ServiceError::invalid_request(CATEGORY_ID_REQUIRED));
        }

        let products = self.products.find_by_category(category_id).await?;
        Ok(self.to_list(products))
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> ServiceResult<ProductListResponse> {
        let products = self.products.find_all().await?;
        crate::info_with_trace!(count = products.len(), "Listed products");
        Ok(self.to_list(products))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> ServiceResult<ProductResponse> {
        self.products
            .find_by_id(id)
            .await?
            .map(|product| product.to_response(&self.cdn_url))
            .ok_or_else(|| ServiceError::ProductNotFound { id: id.to_string() })
    }

    /// Raw product, for joins in other services
    pub async fn find_product(&self, id: &str) -> ServiceResult<Option<Product>> {
        Ok(self.products.find_by_id(id).await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(&self, request: CreateProductRequest) -> ServiceResult<ProductResponse> {
        if request.name.trim().is_empty()
            || request.description.trim().is_empty()
            || request.image_url.trim().is_empty()
            || request.variants.is_empty()
        {
            return Err(ServiceError::invalid_request(ALL_FIELDS_REQUIRED));
        }
        request.validate()?;

        let product = Product::new(request);
        if let Some(category_id) = &product.category_id {
            if self.categories.find_by_id(category_id).await?.is_none() {
                return Err(ServiceError::CategoryNotFound {
                    id: category_id.clone(),
                });
            }
        }

        let product = self.products.create(product).await?;
        crate::info_with_trace!(product_id = %product.id, "Product created");
        Ok(product.to_response(&self.cdn_url))
    }

    fn to_list(&self, products: Vec<Product>) -> ProductListResponse {
        let products: Vec<ProductResponse> = products
            .iter()
            .map(|p| p.to_response(&self.cdn_url))
            .collect();
        let total_count = products.len();

        ProductListResponse {
            products,
            total_count,
        }
    }
}
