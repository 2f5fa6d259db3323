use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::{
    attribute_to_variant, collect_pages, dynamodb_span, get_datetime, get_decimal, get_optional_string,
    get_parsed, get_string, map_dynamodb_error, timestamp_value, variant_to_attribute,
    GATEWAY_ORDER_INDEX, USER_INDEX,
};
use crate::models::{Order, OrderStatus, RepositoryError, RepositoryResult};

/// Data access for orders. Status changes go exclusively through
/// [`OrderRepository::transition_status`].
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: Order) -> RepositoryResult<Order>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Order>>;

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> RepositoryResult<Option<Order>>;

    /// A user's orders, newest first
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Order>>;

    /// Atomically moves an order from `from` to `to`, recording the payment id.
    /// Returns `None` when the order is missing or no longer in `from`.
    async fn transition_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        payment_id: Option<String>,
    ) -> RepositoryResult<Option<Order>>;

    /// Pending orders created before `cutoff`, oldest first
    async fn find_pending_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<Vec<Order>>;
}

pub struct DynamoDbOrderRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    user_index: String,
    gateway_order_index: String,
    region: String,
}

impl DynamoDbOrderRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            user_index: USER_INDEX.to_string(),
            gateway_order_index: GATEWAY_ORDER_INDEX.to_string(),
            region,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn span(&self, operation: &str) -> tracing::Span {
        dynamodb_span(operation, &self.table_name, &self.region)
    }

    pub fn order_to_item(&self, order: &Order) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert("id".to_string(), AttributeValue::S(order.id.clone()));
        item.insert("user_id".to_string(), AttributeValue::S(order.user_id.clone()));
        item.insert(
            "product_id".to_string(),
            AttributeValue::S(order.product_id.clone()),
        );
        item.insert("variant".to_string(), variant_to_attribute(&order.variant));
        item.insert(
            "gateway_order_id".to_string(),
            AttributeValue::S(order.gateway_order_id.clone()),
        );
        if let Some(ref payment_id) = order.payment_id {
            item.insert("payment_id".to_string(), AttributeValue::S(payment_id.clone()));
        }
        item.insert("status".to_string(), AttributeValue::S(order.status.to_string()));
        item.insert("amount".to_string(), AttributeValue::N(order.amount.to_string()));
        item.insert("created_at".to_string(), timestamp_value(&order.created_at));
        item.insert("updated_at".to_string(), timestamp_value(&order.updated_at));

        item
    }

    pub fn item_to_order(&self, item: HashMap<String, AttributeValue>) -> RepositoryResult<Order> {
        let variant = item
            .get("variant")
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing variant".to_string(),
            })
            .and_then(attribute_to_variant)?;

        let created_at = get_datetime(&item, "created_at")?;

        Ok(Order {
            id: get_string(&item, "id")?,
            user_id: get_string(&item, "user_id")?,
            product_id: get_string(&item, "product_id")?,
            variant,
            gateway_order_id: get_string(&item, "gateway_order_id")?,
            payment_id: get_optional_string(&item, "payment_id"),
            status: get_parsed(&item, "status")?,
            amount: get_decimal(&item, "amount")?,
            created_at,
            updated_at: get_datetime(&item, "updated_at").unwrap_or(created_at),
        })
    }

    fn parse_items(&self, items: Vec<HashMap<String, AttributeValue>>) -> Vec<Order> {
        let mut orders = Vec::new();
        for item in items {
            match self.item_to_order(item) {
                Ok(order) => orders.push(order),
                Err(e) => warn!("Failed to parse order item: {}", e),
            }
        }
        orders
    }
}

#[async_trait]
impl OrderRepository for DynamoDbOrderRepository {
    #[instrument(skip(self, order), fields(table = %self.table_name, id = %order.id))]
    async fn create(&self, order: Order) -> RepositoryResult<Order> {
        info!("Creating new order");

        let item = self.order_to_item(&order);

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

        info!("Order created successfully");
        Ok(order)
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Order>> {
        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::S(id.to_string()))
                .consistent_read(true)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
        }
        .instrument(self.span("GetItem"))
        .await?;

        response.item.map(|item| self.item_to_order(item)).transpose()
    }

    #[instrument(skip(self), fields(table = %self.table_name, gateway_order_id = %gateway_order_id))]
    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> RepositoryResult<Option<Order>> {
        let response = async {
            self.client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.gateway_order_index)
                .key_condition_expression("gateway_order_id = :gateway_order_id")
                .expression_attribute_values(
                    ":gateway_order_id",
                    AttributeValue::S(gateway_order_id.to_string()),
                )
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
            .map(|item| self.item_to_order(item))
            .transpose()
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id))]
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Order>> {
        info!("Finding orders for user using GSI");

        let items = collect_pages(|start_key| {
            async move {
                self.client
                    .query()
                    .table_name(&self.table_name)
                    .index_name(&self.user_index)
                    .key_condition_expression("user_id = :user_id")
                    .expression_attribute_values(
                        ":user_id",
                        AttributeValue::S(user_id.to_string()),
                    )
                    .scan_index_forward(false)
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
                    .map(|page| (page.items, page.last_evaluated_key))
                    .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
            }
            .instrument(self.span("Query"))
        })
        .await?;

        let mut orders = self.parse_items(items);
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        info!("Found {} orders for user", orders.len());
        Ok(orders)
    }

    #[instrument(skip(self, payment_id), fields(table = %self.table_name, id = %id, from = %from, to = %to))]
    async fn transition_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        payment_id: Option<String>,
    ) -> RepositoryResult<Option<Order>> {
        if !from.can_transition_to(to) {
            return Err(RepositoryError::ConstraintViolation {
                message: format!("Illegal order transition {} -> {}", from, to),
            });
        }

        let mut update_expression = "SET #status = :to, updated_at = :now".to_string();
        let mut values = HashMap::new();
        values.insert(":to".to_string(), AttributeValue::S(to.to_string()));
        values.insert(":from".to_string(), AttributeValue::S(from.to_string()));
        values.insert(":now".to_string(), timestamp_value(&Utc::now()));
        if let Some(payment_id) = payment_id {
            update_expression.push_str(", payment_id = :payment_id");
            values.insert(":payment_id".to_string(), AttributeValue::S(payment_id));
        }

        let result = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::S(id.to_string()))
                .update_expression(update_expression)
                .condition_expression("attribute_exists(id) AND #status = :from")
                .expression_attribute_names("#status", "status")
                .set_expression_attribute_values(Some(values))
                .return_values(ReturnValue::AllNew)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
        }
        .instrument(self.span("UpdateItem"))
        .await;

        match result {
            Ok(output) => {
                info!("Order status updated");
                output
                    .attributes
                    .map(|item| self.item_to_order(item))
                    .transpose()
            }
            Err(RepositoryError::ConditionFailed) => {
                info!("Order not in expected state, transition skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, cutoff = %cutoff))]
    async fn find_pending_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<Vec<Order>> {
        info!("Scanning for stale pending orders");

        let items = collect_pages(|start_key| {
            async move {
                self.client
                    .scan()
                    .table_name(&self.table_name)
                    .filter_expression("#status = :pending AND created_at < :cutoff")
                    .expression_attribute_names("#status", "status")
                    .expression_attribute_values(
                        ":pending",
                        AttributeValue::S(OrderStatus::Pending.to_string()),
                    )
                    .expression_attribute_values(":cutoff", timestamp_value(&cutoff))
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
                    .map(|page| (page.items, page.last_evaluated_key))
                    .map_err(|e| map_dynamodb_error(&self.table_name, e.into()))
            }
            .instrument(self.span("Scan"))
        })
        .await?;

        let mut orders = self.parse_items(items);
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        info!("Found {} stale pending orders", orders.len());
        Ok(orders)
    }
}
