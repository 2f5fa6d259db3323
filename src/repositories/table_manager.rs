use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::{
    map_dynamodb_error, CATEGORY_INDEX, EMAIL_INDEX, GATEWAY_ORDER_INDEX, NAME_INDEX, USER_INDEX,
};
use crate::models::{RepositoryError, RepositoryResult};

/// Table names for every store the service uses
#[derive(Debug, Clone)]
pub struct TableNames {
    pub products: String,
    pub categories: String,
    pub users: String,
    pub orders: String,
}

/// Secondary index definition: name, hash key, optional range key
struct IndexSpec {
    name: &'static str,
    hash_key: &'static str,
    range_key: Option<&'static str>,
}

/// Manages DynamoDB table creation and configuration
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    wait_interval: Duration,
    max_wait_attempts: u32,
}

fn sdk_build_error(what: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::AwsSdk {
        message: format!("Failed to build {}: {}", what, e),
    }
}

fn key(attribute: &str, key_type: KeyType) -> RepositoryResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(attribute)
        .key_type(key_type)
        .build()
        .map_err(|e| sdk_build_error("key schema", e))
}

fn string_attribute(attribute: &str) -> RepositoryResult<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(attribute)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| sdk_build_error("attribute definition", e))
}

impl TableManager {
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self {
            client,
            wait_interval: Duration::from_secs(5),
            max_wait_attempts: 60,
        }
    }

    /// Products keyed by id, indexed by category
    pub async fn create_products_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_table(
            table_name,
            &[IndexSpec {
                name: CATEGORY_INDEX,
                hash_key: "category_id",
                range_key: Some("created_at"),
            }],
        )
        .await
    }

    /// Categories keyed by id, indexed by name
    pub async fn create_categories_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_table(
            table_name,
            &[IndexSpec {
                name: NAME_INDEX,
                hash_key: "name",
                range_key: None,
            }],
        )
        .await
    }

    /// Users keyed by id, indexed by email
    pub async fn create_users_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_table(
            table_name,
            &[IndexSpec {
                name: EMAIL_INDEX,
                hash_key: "email",
                range_key: None,
            }],
        )
        .await
    }

    /// Orders keyed by id, indexed by owner (newest first) and gateway order id
    pub async fn create_orders_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_table(
            table_name,
            &[
                IndexSpec {
                    name: USER_INDEX,
                    hash_key: "user_id",
                    range_key: Some("created_at"),
                },
                IndexSpec {
                    name: GATEWAY_ORDER_INDEX,
                    hash_key: "gateway_order_id",
                    range_key: None,
                },
            ],
        )
        .await
    }

    #[instrument(skip(self, indexes), fields(table_name = %table_name))]
    async fn create_table(&self, table_name: &str, indexes: &[IndexSpec]) -> RepositoryResult<()> {
        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        let mut attribute_names = vec!["id"];
        for index in indexes {
            attribute_names.push(index.hash_key);
            if let Some(range_key) = index.range_key {
                attribute_names.push(range_key);
            }
        }
        attribute_names.sort_unstable();
        attribute_names.dedup();

        let attribute_definitions = attribute_names
            .into_iter()
            .map(string_attribute)
            .collect::<RepositoryResult<Vec<_>>>()?;

        let mut request = self
            .client
            .create_table()
            .table_name(table_name)
            .set_attribute_definitions(Some(attribute_definitions))
            .key_schema(key("id", KeyType::Hash)?)
            .billing_mode(BillingMode::PayPerRequest);

        for index in indexes {
            let mut gsi = GlobalSecondaryIndex::builder()
                .index_name(index.name)
                .key_schema(key(index.hash_key, KeyType::Hash)?)
                .projection(
                    Projection::builder()
                        .projection_type(ProjectionType::All)
                        .build(),
                );
            if let Some(range_key) = index.range_key {
                gsi = gsi.key_schema(key(range_key, KeyType::Range)?);
            }
            request = request.global_secondary_indexes(
                gsi.build().map_err(|e| sdk_build_error("GSI", e))?,
            );
        }

        request
            .send()
            .await
            .map_err(|e| map_dynamodb_error(table_name, e.into()))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Table {} created successfully", table_name);

        Ok(())
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match map_dynamodb_error(table_name, e.into()) {
                RepositoryError::TableNotFound { .. } => Ok(false),
                other => {
                    error!("Error checking table existence: {}", other);
                    Err(other)
                }
            },
        }
    }

    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        let mut attempts = 0;

        loop {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(table_name, e.into()))?;

            match response.table.and_then(|t| t.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            attempts += 1;
            if attempts >= self.max_wait_attempts {
                error!("Timeout waiting for table {} to become active", table_name);
                return Err(RepositoryError::Timeout);
            }

            tokio::time::sleep(self.wait_interval).await;
        }
    }

    /// Create every table concurrently
    #[instrument(skip(self))]
    pub async fn create_all_tables(&self, tables: &TableNames) -> RepositoryResult<()> {
        info!("Creating all tables");

        let (products, categories, users, orders) = tokio::join!(
            self.create_products_table(&tables.products),
            self.create_categories_table(&tables.categories),
            self.create_users_table(&tables.users),
            self.create_orders_table(&tables.orders),
        );

        products?;
        categories?;
        users?;
        orders?;

        info!("All tables created successfully");
        Ok(())
    }
}
