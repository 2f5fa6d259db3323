// Repositories module - data access layer

pub mod category_repository;
pub mod order_repository;
pub mod product_repository;
pub mod table_manager;
pub mod user_repository;


pub use category_repository::{CategoryRepository, DynamoDbCategoryRepository};
pub use order_repository::{DynamoDbOrderRepository, OrderRepository};
pub use product_repository::{DynamoDbProductRepository, ProductRepository};
pub use table_manager::TableManager;
pub use user_repository::{DynamoDbUserRepository, UserRepository};

use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use aws_sdk_dynamodb::Error as DynamoDbError;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use tracing::error;

use crate::models::{ImageVariant, RepositoryError, RepositoryResult};

/// Global secondary index names
pub const CATEGORY_INDEX: &str = "CategoryIndex";
pub const NAME_INDEX: &str = "NameIndex";
pub const EMAIL_INDEX: &str = "EmailIndex";
pub const USER_INDEX: &str = "UserIndex";
pub const GATEWAY_ORDER_INDEX: &str = "GatewayOrderIndex";

/// Client span for a single DynamoDB call, carrying AWS, RPC and DB
/// semantic attributes so the call shows up as a remote dependency.
pub(crate) fn dynamodb_span(operation: &str, table_name: &str, region: &str) -> tracing::Span {
    tracing::info_span!(
        "DynamoDB",
        "aws.service" = "DynamoDB",
        "aws.operation" = operation,
        "aws.region" = %region,
        "aws.dynamodb.table_name" = %table_name,
        "aws.request_id" = tracing::field::Empty,
        "aws.remote.service" = "AWS::DynamoDB",
        "aws.remote.operation" = operation,
        "aws.remote.resource.type" = "AWS::DynamoDB::Table",
        "aws.remote.resource.identifier" = %table_name,
        "otel.kind" = "client",
        "otel.name" = format!("DynamoDB.{}", operation),
        "rpc.system" = "aws-api",
        "rpc.service" = "DynamoDB",
        "rpc.method" = operation,
        "http.status_code" = tracing::field::Empty,
        "db.system" = "dynamodb",
        "db.name" = %table_name,
        "db.operation" = operation,
    )
}

/// Convert a DynamoDB error to RepositoryError
pub(crate) fn map_dynamodb_error(table_name: &str, error: DynamoDbError) -> RepositoryError {
    match error {
        DynamoDbError::ResourceNotFoundException(_) => {
            error!("DynamoDB table not found: {}", table_name);
            RepositoryError::TableNotFound {
                table_name: table_name.to_string(),
            }
        }
        DynamoDbError::ConditionalCheckFailedException(_) => RepositoryError::ConditionFailed,
        DynamoDbError::TransactionCanceledException(ref inner)
            if inner
                .cancellation_reasons()
                .iter()
                .any(|reason| reason.code() == Some("ConditionalCheckFailed")) =>
        {
            RepositoryError::ConditionFailed
        }
        other => {
            error!("DynamoDB error: {:?}", other);
            RepositoryError::AwsSdk {
                message: other.to_string(),
            }
        }
    }
}

pub(crate) type Item = HashMap<String, AttributeValue>;

/// Runs `fetch` from each `LastEvaluatedKey` until a page comes back without one.
/// `fetch` gets the exclusive start key and returns the page's items and its last key.
pub(crate) async fn collect_pages<F, Fut>(mut fetch: F) -> RepositoryResult<Vec<Item>>
where
    F: FnMut(Option<Item>) -> Fut,
    Fut: Future<Output = RepositoryResult<(Option<Vec<Item>>, Option<Item>)>>,
{
    let mut items = Vec::new();
    let mut start_key = None;

    loop {
        let (page, last_key) = fetch(start_key).await?;
        items.extend(page.unwrap_or_default());

        match last_key {
            Some(key) if !key.is_empty() => start_key = Some(key),
            _ => return Ok(items),
        }
    }
}

/// Key of the item that reserves a unique attribute value, e.g. `EMAIL#ada@example.com`.
/// Guard items carry only `id` and `owner_id`, so they never enter a GSI.
pub(crate) fn guard_key(prefix: &str, value: &str) -> String {
    format!("{}#{}", prefix, value)
}

pub(crate) fn is_guard_item(item: &HashMap<String, AttributeValue>, prefix: &str) -> bool {
    item.get("id")
        .and_then(|v| v.as_s().ok())
        .is_some_and(|id| id.starts_with(&format!("{}#", prefix)))
}

/// Conditional put of `item`, failing if its `id` is already taken
pub(crate) fn put_if_absent(
    table_name: &str,
    item: HashMap<String, AttributeValue>,
) -> RepositoryResult<TransactWriteItem> {
    let put = Put::builder()
        .table_name(table_name)
        .set_item(Some(item))
        .condition_expression("attribute_not_exists(id)")
        .build()
        .map_err(|e| RepositoryError::InvalidQuery {
            message: e.to_string(),
        })?;
    Ok(TransactWriteItem::builder().put(put).build())
}

/// Entity item plus the guard reserving `value` under `prefix`, both conditional
pub(crate) fn guarded_put(
    table_name: &str,
    item: HashMap<String, AttributeValue>,
    prefix: &str,
    value: &str,
) -> RepositoryResult<Vec<TransactWriteItem>> {
    let owner_id = item.get("id").cloned().ok_or_else(|| missing("id"))?;
    let mut guard = HashMap::new();
    guard.insert("id".to_string(), AttributeValue::S(guard_key(prefix, value)));
    guard.insert("owner_id".to_string(), owner_id);

    Ok(vec![
        put_if_absent(table_name, item)?,
        put_if_absent(table_name, guard)?,
    ])
}

fn missing(field: &str) -> RepositoryError {
    RepositoryError::InvalidQuery {
        message: format!("Missing or invalid {}", field),
    }
}

pub(crate) fn get_string(
    item: &HashMap<String, AttributeValue>,
    field: &str,
) -> RepositoryResult<String> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| missing(field))
}

pub(crate) fn get_optional_string(
    item: &HashMap<String, AttributeValue>,
    field: &str,
) -> Option<String> {
    item.get(field).and_then(|v| v.as_s().ok()).cloned()
}

pub(crate) fn get_decimal(
    item: &HashMap<String, AttributeValue>,
    field: &str,
) -> RepositoryResult<Decimal> {
    item.get(field)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| Decimal::from_str(s).ok())
        .ok_or_else(|| missing(field))
}

pub(crate) fn get_parsed<T: FromStr>(
    item: &HashMap<String, AttributeValue>,
    field: &str,
) -> RepositoryResult<T> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| missing(field))
}

pub(crate) fn get_datetime(
    item: &HashMap<String, AttributeValue>,
    field: &str,
) -> RepositoryResult<DateTime<Utc>> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| missing(field))
}

/// Fixed-width RFC 3339 UTC, so stored timestamps compare lexically
pub(crate) fn timestamp_string(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn timestamp_value(ts: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(timestamp_string(ts))
}

pub(crate) fn variant_to_attribute(variant: &ImageVariant) -> AttributeValue {
    let mut map = HashMap::new();
    map.insert(
        "type".to_string(),
        AttributeValue::S(variant.variant_type.to_string()),
    );
    map.insert(
        "license".to_string(),
        AttributeValue::S(variant.license.to_string()),
    );
    map.insert(
        "price".to_string(),
        AttributeValue::N(variant.price.to_string()),
    );
    AttributeValue::M(map)
}

pub(crate) fn attribute_to_variant(value: &AttributeValue) -> RepositoryResult<ImageVariant> {
    let map = value.as_m().map_err(|_| RepositoryError::InvalidQuery {
        message: "Variant is not a map".to_string(),
    })?;
    Ok(ImageVariant {
        variant_type: get_parsed(map, "type")?,
        license: get_parsed(map, "license")?,
        price: get_decimal(map, "price")?,
    })
}
