use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::{
    collect_pages, dynamodb_span, get_datetime, get_string, guarded_put, is_guard_item, map_dynamodb_error,
    timestamp_value, NAME_INDEX,
};
use crate::models::{Category, RepositoryResult};

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn find_all(&self) -> RepositoryResult<Vec<Category>>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Category>>;

    /// Exact-name lookup via the name GSI
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Category>>;

    /// Fails with `ConditionFailed` when the name is already taken
    async fn create(&self, category: Category) -> RepositoryResult<Category>;
}

/// Prefix of the items reserving a category name
pub const NAME_GUARD_PREFIX: &str = "NAME";

pub struct DynamoDbCategoryRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    name_index: String,
    region: String,
}

impl DynamoDbCategoryRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            name_index: NAME_INDEX.to_string(),
            region,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn span(&self, operation: &str) -> tracing::Span {
        dynamodb_span(operation, &self.table_name, &self.region)
    }

    pub fn category_to_item(&self, category: &Category) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(category.id.clone()));
        item.insert("name".to_string(), AttributeValue::S(category.name.clone()));
        item.insert("created_at".to_string(), timestamp_value(&category.created_at));
        item.insert("updated_at".to_string(), timestamp_value(&category.updated_at));
        item
    }

    pub fn item_to_category(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> RepositoryResult<Category> {
        let created_at = get_datetime(&item, "created_at")?;
        Ok(Category {
            id: get_string(&item, "id")?,
            name: get_string(&item, "name")?,
            created_at,
            updated_at: get_datetime(&item, "updated_at").unwrap_or(created_at),
        })
    }
}

#[async_trait]
impl CategoryRepository for DynamoDbCategoryRepository {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Category>> {
        info!("Scanning all categories");

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

        let mut categories = Vec::new();
        for item in items {
            if is_guard_item(&item, NAME_GUARD_PREFIX) {
                continue;
            }
            match self.item_to_category(item) {
                Ok(category) => categories.push(category),
                Err(e) => warn!("Failed to parse category item: {}", e),
            }
        }

        categories.sort_by(|a, b| a.name.cmp(&b.name));
        info!("Found {} categories", categories.len());
        Ok(categories)
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Category>> {
        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::S(id.to_string()))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
        }
        .instrument(self.span("GetItem"))
        .await?;

        response
            .item
            .map(|item| self.item_to_category(item))
            .transpose()
    }

    #[instrument(skip(self), fields(table = %self.table_name, name = %name))]
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Category>> {
        let response = async {
            self.client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.name_index)
                .key_condition_expression("#name = :name")
                .expression_attribute_names("#name", "name")
                .expression_attribute_values(":name", AttributeValue::S(name.to_string()))
                .limit(1)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
        }
        .instrument(self.span("Query"))
        .await?;

        response
            .items
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|item| self.item_to_category(item))
            .transpose()
    }

    #[instrument(skip(self, category), fields(table = %self.table_name, name = %category.name))]
    async fn create(&self, category: Category) -> RepositoryResult<Category> {
        info!("Creating new category");

        let items = guarded_put(
            &self.table_name,
            self.category_to_item(&category),
            NAME_GUARD_PREFIX,
            &category.name,
        )?;

        async {
            self.client
                .transact_write_items()
                .set_transact_items(Some(items))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
        }
        .instrument(self.span("TransactWriteItems"))
        .await?;

        info!("Category created successfully");
        Ok(category)
    }
}
