use async_trait::async_trait;
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

use super::{
    attribute_to_variant, collect_pages, dynamodb_span, get_datetime, get_optional_string, get_string,
    map_dynamodb_error, timestamp_value, variant_to_attribute, CATEGORY_INDEX,
};
use crate::models::{Product, RepositoryError, RepositoryResult};

/// Data access for catalog products
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products in the catalog
    async fn find_all(&self) -> RepositoryResult<Vec<Product>>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>>;

    /// Products in a category, via the category GSI
    async fn find_by_category(&self, category_id: &str) -> RepositoryResult<Vec<Product>>;

    /// Insert a new product; fails if the id is taken
    async fn create(&self, product: Product) -> RepositoryResult<Product>;
}

pub struct DynamoDbProductRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    category_index: String,
    region: String,
}

impl DynamoDbProductRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            category_index: CATEGORY_INDEX.to_string(),
            region,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn category_index(&self) -> &str {
        &self.category_index
    }

    fn span(&self, operation: &str) -> tracing::Span {
        dynamodb_span(operation, &self.table_name, &self.region)
    }

    pub fn product_to_item(&self, product: &Product) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert("id".to_string(), AttributeValue::S(product.id.clone()));
        item.insert("name".to_string(), AttributeValue::S(product.name.clone()));
        item.insert(
            "description".to_string(),
            AttributeValue::S(product.description.clone()),
        );
        item.insert(
            "image_url".to_string(),
            AttributeValue::S(product.image_url.clone()),
        );
        // GSI key attributes must be absent rather than empty
        if let Some(ref category_id) = product.category_id {
            item.insert(
                "category_id".to_string(),
                AttributeValue::S(category_id.clone()),
            );
        }

        let variants = product.variants.iter().map(variant_to_attribute).collect();
        item.insert("variants".to_string(), AttributeValue::L(variants));

        item.insert("created_at".to_string(), timestamp_value(&product.created_at));
        item.insert("updated_at".to_string(), timestamp_value(&product.updated_at));

        item
    }

    pub fn item_to_product(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> RepositoryResult<Product> {
        let variants = item
            .get("variants")
            .and_then(|v| v.as_l().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing variants".to_string(),
            })?
            .iter()
            .map(attribute_to_variant)
            .collect::<RepositoryResult<Vec<_>>>()?;

        let created_at = get_datetime(&item, "created_at")?;
        let updated_at = get_datetime(&item, "updated_at").unwrap_or(created_at);

        Ok(Product {
            id: get_string(&item, "id")?,
            name: get_string(&item, "name")?,
            description: get_string(&item, "description")?,
            image_url: get_string(&item, "image_url")?,
            category_id: get_optional_string(&item, "category_id"),
            variants,
            created_at,
            updated_at,
        })
    }

    fn parse_items(&self, items: Vec<HashMap<String, AttributeValue>>) -> Vec<Product> {
        let mut products = Vec::new();
        for item in items {
            match self.item_to_product(item) {
                Ok(product) => products.push(product),
                Err(e) => {
                    warn!("Failed to parse product item: {}", e);
                    continue;
                }
            }
        }
        products
    }
}

#[async_trait]
impl ProductRepository for DynamoDbProductRepository {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Product>> {
        info!("Scanning all products");

        let items = collect_pages(|start_key| {
            async move {
                self.client
                    .scan()
                    .table_name(&self.table_name)
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
                    .map(|page| (page.items, page.last_evaluated_key))
                    .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
            }
            .instrument(self.span("Scan"))
        })
        .await?;

        let mut products = self.parse_items(items);
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        info!("Found {} products", products.len());
        Ok(products)
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>> {
        info!("Finding product by ID");

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::S(id.to_string()))
                .send()
                .await;

            match &result {
                Ok(output) => {
                    tracing::Span::current().record("http.status_code", 200);
                    if let Some(request_id) = output.request_id() {
                        tracing::Span::current().record("aws.request_id", request_id);
                    }
                }
                Err(e) => {
                    tracing::Span::current().record("http.status_code", 400);
                    error!("DynamoDB GetItem failed: {}", e);
                }
            }

            result.map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
        }
        .instrument(self.span("GetItem"))
        .await?;

        match response.item {
            Some(item) => Ok(Some(self.item_to_product(item)?)),
            None => {
                info!("Product not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, category_id = %category_id))]
    async fn find_by_category(&self, category_id: &str) -> RepositoryResult<Vec<Product>> {
        info!("Finding products by category using GSI");

        let items = collect_pages(|start_key| {
            async move {
                self.client
                    .query()
                    .table_name(&self.table_name)
                    .index_name(&self.category_index)
                    .key_condition_expression("category_id = :category_id")
                    .expression_attribute_values(
                        ":category_id",
                        AttributeValue::S(category_id.to_string()),
                    )
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
                    .map(|page| (page.items, page.last_evaluated_key))
                    .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
            }
            .instrument(self.span("Query"))
        })
        .await?;

        let products = self.parse_items(items);
        info!("Found {} products in category", products.len());
        Ok(products)
    }

    #[instrument(skip(self, product), fields(table = %self.table_name, id = %product.id))]
    async fn create(&self, product: Product) -> RepositoryResult<Product> {
        info!("Creating new product");

        let item = self.product_to_item(&product);

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(id)")
                .send()
                .await
                .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
        }
        .instrument(self.span("PutItem"))
        .await?;

        info!("Product created successfully");
        Ok(product)
    }
}
