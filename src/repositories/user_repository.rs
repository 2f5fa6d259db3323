use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, Instrument};

use super::{
    dynamodb_span, get_datetime, get_parsed, get_string, guarded_put, map_dynamodb_error,
    timestamp_value, EMAIL_INDEX,
};
use crate::models::{RepositoryResult, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    /// Emails are stored lowercased; callers pass the normalized form
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Fails with `ConditionFailed` when the email is already registered
    async fn create(&self, user: User) -> RepositoryResult<User>;
}

/// Prefix of the items reserving an email address
pub const EMAIL_GUARD_PREFIX: &str = "EMAIL";

pub struct DynamoDbUserRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    email_index: String,
    region: String,
}

impl DynamoDbUserRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            email_index: EMAIL_INDEX.to_string(),
            region,
        }
    }

    fn span(&self, operation: &str) -> tracing::Span {
        dynamodb_span(operation, &self.table_name, &self.region)
    }

    pub fn user_to_item(&self, user: &User) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(user.id.clone()));
        item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
        item.insert(
            "password_hash".to_string(),
            AttributeValue::S(user.password_hash.clone()),
        );
        item.insert("role".to_string(), AttributeValue::S(user.role.to_string()));
        item.insert("created_at".to_string(), timestamp_value(&user.created_at));
        item.insert("updated_at".to_string(), timestamp_value(&user.updated_at));
        item
    }

    pub fn item_to_user(&self, item: HashMap<String, AttributeValue>) -> RepositoryResult<User> {
        let created_at = get_datetime(&item, "created_at")?;
        Ok(User {
            id: get_string(&item, "id")?,
            email: get_string(&item, "email")?,
            password_hash: get_string(&item, "password_hash")?,
            role: get_parsed(&item, "role")?,
            created_at,
            updated_at: get_datetime(&item, "updated_at").unwrap_or(created_at),
        })
    }
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
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

        response.item.map(|item| self.item_to_user(item)).transpose()
    }

    #[instrument(skip(self, email), fields(table = %self.table_name))]
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let response = async {
            self.client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.email_index)
                .key_condition_expression("email = :email")
                .expression_attribute_values(":email", AttributeValue::S(email.to_string()))
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
            .map(|item| self.item_to_user(item))
            .transpose()
    }

    #[instrument(skip(self, user), fields(table = %self.table_name, id = %user.id))]
    async fn create(&self, user: User) -> RepositoryResult<User> {
        info!("Creating new user");

        let items = guarded_put(
            &self.table_name,
            self.user_to_item(&user),
            EMAIL_GUARD_PREFIX,
            &user.email,
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

        info!("User created successfully");
        Ok(user)
    }
}
