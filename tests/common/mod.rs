#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use imageshop_rs::models::{
    Category, Order, OrderStatus, Product, RepositoryError, User,
};
use imageshop_rs::observability::Metrics;
use imageshop_rs::repositories::table_manager::TableNames;
use imageshop_rs::repositories::{
    CategoryRepository, OrderRepository, ProductRepository, TableManager, UserRepository,
};
use imageshop_rs::services::{
    sign_payload, AuthService, CatalogService, CdnAuthService, EmailMessage, MailError, Mailer,
    OrderService, RazorpayGateway, WebhookService,
};
use imageshop_rs::{create_app, AppServices};

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const SESSION_SECRET: &str = "session_integration";
pub const CDN_ENDPOINT: &str = "https://ik.imagekit.io/shop";
pub const ADMIN_EMAIL: &str = "admin@imageshop.test";
pub const ADMIN_PASSWORD: &str = "admin-password-1";

// ---------------------------------------------------------------------------
// In-memory repositories
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProducts {
    items: Mutex<Vec<Product>>,
}

#[async_trait]
impl ProductRepository for InMemoryProducts {
    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, RepositoryError> {
        Ok(self.items.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_category(&self, category_id: &str) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.category_id.as_deref() == Some(category_id))
            .cloned()
            .collect())
    }

    async fn create(&self, product: Product) -> Result<Product, RepositoryError> {
        self.items.lock().unwrap().push(product.clone());
        Ok(product)
    }
}

impl InMemoryProducts {
    pub fn remove(&self, id: &str) {
        self.items.lock().unwrap().retain(|p| p.id != id);
    }
}

#[derive(Default)]
pub struct InMemoryCategories {
    items: Mutex<Vec<Category>>,
}

#[async_trait]
impl CategoryRepository for InMemoryCategories {
    async fn find_all(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Category>, RepositoryError> {
        Ok(self.items.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }

    /// Names are reserved by a guard item in DynamoDB
    async fn create(&self, category: Category) -> Result<Category, RepositoryError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|c| c.name == category.name) {
            return Err(RepositoryError::ConditionFailed);
        }
        items.push(category.clone());
        Ok(category)
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    items: Mutex<HashMap<String, User>>,
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.items.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    /// Emails are reserved by a guard item in DynamoDB
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut items = self.items.lock().unwrap();
        if items.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::ConditionFailed);
        }
        items.insert(user.id.clone(), user.clone());
        Ok(user)
    }
}

impl InMemoryUsers {
    pub fn count_by_email(&self, email: &str) -> usize {
        self.items
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.email == email)
            .count()
    }
}

/// Transitions hold the lock for the compare and the write, like the
/// conditional update in DynamoDB
#[derive(Default)]
pub struct InMemoryOrders {
    items: Mutex<HashMap<String, Order>>,
}

impl InMemoryOrders {
    pub fn insert(&self, order: Order) {
        self.items.lock().unwrap().insert(order.id.clone(), order);
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        self.items.lock().unwrap().get(id).cloned()
    }

    pub fn by_gateway_id(&self, gateway_order_id: &str) -> Option<Order> {
        self.items
            .lock()
            .unwrap()
            .values()
            .find(|o| o.gateway_order_id == gateway_order_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create(&self, order: Order) -> Result<Order, RepositoryError> {
        self.insert(order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self.by_gateway_id(gateway_order_id))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        payment_id: Option<String>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut items = self.items.lock().unwrap();
        match items.get_mut(id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.payment_id = payment_id;
                order.updated_at = Utc::now();
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < cutoff)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}

// ---------------------------------------------------------------------------
// Mail and gateway doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            // Any address error stands in for an SMTP failure
            return Err(MailError::Address(
                "not-an-address".parse::<lettre::Address>().unwrap_err(),
            ));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Echoes amount and currency back with a fresh gateway order id
struct GatewayResponder {
    counter: AtomicUsize,
}

impl Respond for GatewayResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("order_test_{}", n),
            "entity": "order",
            "amount": body["amount"],
            "currency": body["currency"],
            "receipt": body["receipt"],
            "status": "created"
        }))
    }
}

// ---------------------------------------------------------------------------
// Running server
// ---------------------------------------------------------------------------

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub gateway: MockServer,
    pub products: Arc<InMemoryProducts>,
    pub orders: Arc<InMemoryOrders>,
    pub users: Arc<InMemoryUsers>,
    pub mailer: Arc<RecordingMailer>,
    pub metrics: Arc<Metrics>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(GatewayResponder {
                counter: AtomicUsize::new(0),
            })
            .mount(&gateway)
            .await;

        let products = Arc::new(InMemoryProducts::default());
        let categories = Arc::new(InMemoryCategories::default());
        let users = Arc::new(InMemoryUsers::default());
        let orders = Arc::new(InMemoryOrders::default());
        let mailer = Arc::new(RecordingMailer::default());
        let metrics = Arc::new(Metrics::new().unwrap());

        let razorpay = Arc::new(
            RazorpayGateway::new(
                &gateway.uri(),
                "rzp_test_key",
                "rzp_test_secret",
                Duration::from_secs(5),
            )
            .unwrap(),
        );

        let auth = Arc::new(AuthService::new(
            users.clone(),
            SESSION_SECRET.to_string(),
            chrono::Duration::days(30),
        ));
        // Same path the binary takes with IMAGESHOP_ADMIN_EMAIL/PASSWORD set
        auth.ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
        let catalog = Arc::new(CatalogService::new(
            products.clone(),
            categories,
            CDN_ENDPOINT.to_string(),
        ));
        let order_service = Arc::new(OrderService::new(
            orders.clone(),
            products.clone(),
            razorpay,
            "USD".to_string(),
            CDN_ENDPOINT.to_string(),
            30,
        ));
        let webhooks = Arc::new(WebhookService::new(
            orders.clone(),
            users.clone(),
            products.clone(),
            mailer.clone(),
            WEBHOOK_SECRET.to_string(),
        )
        .with_unknown_order_recheck(Duration::from_millis(10)));
        let cdn = Arc::new(CdnAuthService::new(
            "private_test".to_string(),
            "public_test".to_string(),
            CDN_ENDPOINT.to_string(),
        ));

        // Never reached by these tests beyond the admin check
        let dynamodb = aws_sdk_dynamodb::Client::from_conf(
            aws_sdk_dynamodb::Config::builder()
                .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
                .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
                .build(),
        );

        let app = create_app(AppServices {
            metrics: metrics.clone(),
            auth,
            catalog,
            orders: order_service,
            webhooks,
            cdn,
            table_manager: Arc::new(TableManager::new(Arc::new(dynamodb))),
            table_names: TableNames {
                products: "TestProducts".to_string(),
                categories: "TestCategories".to_string(),
                users: "TestUsers".to_string(),
                orders: "TestOrders".to_string(),
            },
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{}", addr),
            gateway,
            products,
            orders,
            users,
            mailer,
            metrics,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200, "login failed for {}", email);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registers a fresh user and returns its session token
    pub async fn user_token(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": "correct-horse" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);

        self.login(email, "correct-horse").await
    }

    /// Creates a product with one SQUARE/personal variant at 19.99
    pub async fn create_product(&self, admin_token: &str, name: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/products"))
            .bearer_auth(admin_token)
            .json(&json!({
                "name": name,
                "description": "A test image",
                "image_url": "/products/test.jpg",
                "variants": [
                    { "type": "SQUARE", "license": "personal", "price": 19.99 },
                    { "type": "WIDE", "license": "commercial", "price": "49.00" }
                ]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    /// Places an order for the SQUARE/personal variant, returning the response body
    pub async fn place_order(&self, token: &str, product_id: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/orders"))
            .bearer_auth(token)
            .json(&json!({
                "product_id": product_id,
                "variant": { "type": "SQUARE", "license": "personal", "price": "19.99" }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }

    pub async fn post_webhook(&self, body: &str, signature: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .post(self.url("/api/webhook/razorpay"))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(signature) = signature {
            request = request.header("x-razorpay-signature", signature);
        }
        request.send().await.unwrap()
    }

    pub async fn post_signed_webhook(&self, body: &str) -> reqwest::Response {
        let signature = sign_payload(WEBHOOK_SECRET.as_bytes(), body.as_bytes());
        self.post_webhook(body, Some(&signature)).await
    }
}

pub fn payment_event(event: &str, payment_id: &str, gateway_order_id: &str) -> String {
    json!({
        "entity": "event",
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": gateway_order_id,
                    "amount": 1999,
                    "currency": "USD"
                }
            }
        }
    })
    .to_string()
}
