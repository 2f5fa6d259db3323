use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use imageshop_rs::models::{ImageVariant, License, Order, OrderStatus, VariantType};
use imageshop_rs::services::sign_payload;

mod common;
use common::*;

async fn error_message(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_health_and_metrics() {
    let env = TestEnvironment::new().await;

    let response = env.client.get(env.url("/health/status")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    let response = env.client.get(env.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn test_register_and_login() {
    let env = TestEnvironment::new().await;
    let register = |body: Value| {
        env.client
            .post(env.url("/api/auth/register"))
            .json(&body)
            .send()
    };

    let response = register(json!({ "email": "Ada@Example.com", "password": "pw-123456" }))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert!(body["user_id"].is_string());

    let response = register(json!({ "email": "ada@example.com", "password": "other-password" }))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_message(response).await, "Email is already taken");

    let response = register(json!({ "email": "grace@example.com" })).await.unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(
        error_message(response).await,
        "Both email and password are required"
    );

    let response = env
        .client
        .post(env.url("/api/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = env
        .client
        .post(env.url("/api/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": "pw-123456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "user");
    assert!(body["token"].as_str().unwrap().split('.').count() == 3);
}

#[tokio::test]
async fn test_seeded_admin_can_log_in() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .post(env.url("/api/auth/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "admin");
    assert_eq!(env.users.count_by_email(ADMIN_EMAIL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_keep_email_unique() {
    let env = TestEnvironment::new().await;

    let attempts: Vec<_> = (0..4)
        .map(|i| {
            let request = env
                .client
                .post(env.url("/api/auth/register"))
                .json(&json!({ "email": "twin@example.com", "password": format!("password-{}", i) }));
            tokio::spawn(async move {
                let response = request.send().await.unwrap();
                let status = response.status().as_u16();
                let body: Value = response.json().await.unwrap();
                (status, body["error"].as_str().unwrap_or_default().to_string())
            })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            (201, _) => created += 1,
            (400, error) => assert_eq!(error, "Email is already taken"),
            other => panic!("Unexpected registration outcome {:?}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(env.users.count_by_email("twin@example.com"), 1);
}

#[tokio::test]
async fn test_category_management() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let user = env.user_token("shopper@example.com").await;

    let create = |token: String, name: &'static str| {
        env.client
            .post(env.url("/api/category"))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
    };

    let response = create(user.clone(), "shoes").await.unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(error_message(response).await, "Unauthorized request");

    let response = create(admin.clone(), "shoes").await.unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Category created successfully");
    assert_eq!(body["category"]["name"], "shoes");

    let response = create(admin.clone(), "shoes").await.unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_message(response).await, "Category already exist");

    let response = create(admin.clone(), "Shoes2").await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = env
        .client
        .post(env.url("/api/category"))
        .bearer_auth(admin.clone())
        .json(&json!({ "name": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(body["timestamp"].is_string());

    let response = env.client.get(env.url("/api/category")).send().await.unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_count"], 1);

    let response = env
        .client
        .post(env.url("/api/category/products"))
        .json(&json!({ "category_id": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_message(response).await, "categoryId is required");
}

#[tokio::test]
async fn test_product_catalog() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;

    let response = env.client.get(env.url("/api/products")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(error_message(response).await, "No products found");

    let response = env
        .client
        .post(env.url("/api/products"))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Sunset",
            "description": "Orange sky",
            "image_url": "/sunset.jpg",
            "variants": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_message(response).await, "All fields are required");

    let user = env.user_token("viewer@example.com").await;
    let response = env
        .client
        .post(env.url("/api/products"))
        .bearer_auth(&user)
        .json(&json!({ "name": "Sunset" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let product = env.create_product(&admin, "Sunset").await;
    let product_id = product["id"].as_str().unwrap();
    assert!(product["image_url"]
        .as_str()
        .unwrap()
        .starts_with(CDN_ENDPOINT));

    let response = env
        .client
        .get(env.url(&format!("/api/products/{}", product_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["name"], "Sunset");
    assert_eq!(fetched["variants"].as_array().unwrap().len(), 2);

    let response = env
        .client
        .get(env.url("/api/products/P-missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(error_message(response).await, "No Product Found");

    let response = env.client.get(env.url("/api/products")).send().await.unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_count"], 1);
}

#[tokio::test]
async fn test_order_creation() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let token = env.user_token("buyer@example.com").await;
    let product = env.create_product(&admin, "Harbor").await;
    let product_id = product["id"].as_str().unwrap();

    let response = env
        .client
        .post(env.url("/api/orders"))
        .json(&json!({ "product_id": product_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = env
        .client
        .post(env.url("/api/orders"))
        .bearer_auth(&token)
        .json(&json!({ "product_id": product_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_message(response).await, "Invalid request");

    let response = env
        .client
        .post(env.url("/api/orders"))
        .bearer_auth(&token)
        .json(&json!({ "product_id": product_id, "variant": { "type": "SQUARE" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid request");
    assert!(body["timestamp"].is_string());

    let response = env
        .client
        .post(env.url("/api/orders"))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": product_id,
            "variant": { "type": "SQUARE", "license": "personal", "price": "0.01" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(env.orders.len(), 0);

    let order = env.place_order(&token, product_id).await;
    assert_eq!(order["order_id"], "order_test_1");
    assert_eq!(order["amount"], 1999);
    assert_eq!(order["currency"], "USD");

    let stored = env.orders.by_gateway_id("order_test_1").unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.amount, dec!(19.99));
    assert_eq!(order["db_order_id"], stored.id.as_str());
}

#[tokio::test]
async fn test_gateway_failure_returns_generic_error() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let token = env.user_token("unlucky@example.com").await;
    let product = env.create_product(&admin, "Storm").await;

    env.gateway.reset().await;

    let response = env
        .client
        .post(env.url("/api/orders"))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": product["id"],
            "variant": { "type": "SQUARE", "license": "personal", "price": "19.99" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(error_message(response).await, "Failed to create order");
    assert_eq!(env.orders.len(), 0);
}

#[tokio::test]
async fn test_webhook_completes_order_once() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let token = env.user_token("collector@example.com").await;
    let product = env.create_product(&admin, "Glacier").await;
    let order = env.place_order(&token, product["id"].as_str().unwrap()).await;
    let gateway_order_id = order["order_id"].as_str().unwrap();

    let body = payment_event("payment.captured", "pay_1", gateway_order_id);

    let response = env.post_webhook(&body, Some("deadbeef")).await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_message(response).await, "Invalid signature");
    let response = env.post_webhook(&body, None).await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(
        env.orders.by_gateway_id(gateway_order_id).unwrap().status,
        OrderStatus::Pending
    );

    let response = env.post_signed_webhook(&body).await;
    assert_eq!(response.status().as_u16(), 200);
    let ack: Value = response.json().await.unwrap();
    assert_eq!(ack, json!({ "received": true }));

    let stored = env.orders.by_gateway_id(gateway_order_id).unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(stored.payment_id.as_deref(), Some("pay_1"));

    let sent = env.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "collector@example.com");
    assert!(sent[0].body.contains("Glacier"));

    // Redelivery is acknowledged without a second email
    let response = env.post_signed_webhook(&body).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(env.mailer.sent().len(), 1);

    let response = env
        .client
        .get(env.url("/api/orders/user"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let orders: Value = response.json().await.unwrap();
    assert_eq!(orders["total_count"], 1);
    assert_eq!(orders["orders"][0]["status"], "completed");
    assert_eq!(orders["orders"][0]["product"]["name"], "Glacier");
    assert_eq!(orders["orders"][0]["amount"], json!(19.99));
    assert_eq!(orders["orders"][0]["variant"]["price"], json!(19.99));

    let metrics = env.metrics.encode().unwrap();
    assert!(metrics.contains(
        "webhook_events_total{event=\"payment.captured\",outcome=\"completed\"} 1"
    ));
    assert!(metrics.contains(
        "webhook_events_total{event=\"payment.captured\",outcome=\"already_processed\"} 1"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_webhooks_send_one_email() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let token = env.user_token("racer@example.com").await;
    let product = env.create_product(&admin, "Dunes").await;
    let order = env.place_order(&token, product["id"].as_str().unwrap()).await;
    let body = payment_event("payment.captured", "pay_race", order["order_id"].as_str().unwrap());
    let signature = sign_payload(WEBHOOK_SECRET.as_bytes(), body.as_bytes());

    let deliveries: Vec<_> = (0..5)
        .map(|_| {
            let request = env
                .client
                .post(env.url("/api/webhook/razorpay"))
                .header("content-type", "application/json")
                .header("x-razorpay-signature", signature.clone())
                .body(body.clone());
            tokio::spawn(async move { request.send().await.unwrap().status().as_u16() })
        })
        .collect();

    for delivery in deliveries {
        assert_eq!(delivery.await.unwrap(), 200);
    }
    assert_eq!(env.mailer.sent().len(), 1);
    assert_eq!(
        env.orders
            .by_gateway_id(order["order_id"].as_str().unwrap())
            .unwrap()
            .status,
        OrderStatus::Completed
    );
}

#[tokio::test]
async fn test_payment_failed_marks_order_failed_without_email() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let token = env.user_token("declined@example.com").await;
    let product = env.create_product(&admin, "Canyon").await;
    let order = env.place_order(&token, product["id"].as_str().unwrap()).await;
    let gateway_order_id = order["order_id"].as_str().unwrap();

    let response = env
        .post_signed_webhook(&payment_event("payment.failed", "pay_x", gateway_order_id))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(
        env.orders.by_gateway_id(gateway_order_id).unwrap().status,
        OrderStatus::Failed
    );
    assert!(env.mailer.sent().is_empty());

    // A late capture cannot revive a failed order
    let response = env
        .post_signed_webhook(&payment_event("payment.captured", "pay_y", gateway_order_id))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        env.orders.by_gateway_id(gateway_order_id).unwrap().status,
        OrderStatus::Failed
    );
    assert!(env.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_webhook_edge_cases() {
    let env = TestEnvironment::new().await;

    let response = env
        .post_signed_webhook(&payment_event("payment.captured", "pay_1", "order_unknown"))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(env.orders.len(), 0);
    assert!(env.mailer.sent().is_empty());

    let response = env
        .post_signed_webhook(r#"{"event":"refund.created","payload":{}}"#)
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = env.post_signed_webhook("{not json").await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_mail_failure_does_not_fail_webhook() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let token = env.user_token("offline@example.com").await;
    let product = env.create_product(&admin, "Fjord").await;
    let order = env.place_order(&token, product["id"].as_str().unwrap()).await;
    let gateway_order_id = order["order_id"].as_str().unwrap();

    env.mailer.set_failing(true);
    let response = env
        .post_signed_webhook(&payment_event("payment.captured", "pay_m", gateway_order_id))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        env.orders.by_gateway_id(gateway_order_id).unwrap().status,
        OrderStatus::Completed
    );

    let metrics = env.metrics.encode().unwrap();
    assert!(metrics.contains("emails_sent_total{status=\"failed\"} 1"));
}

#[tokio::test]
async fn test_user_orders_with_deleted_product() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let token = env.user_token("history@example.com").await;
    let product = env.create_product(&admin, "Meadow").await;
    let product_id = product["id"].as_str().unwrap();
    env.place_order(&token, product_id).await;

    env.products.remove(product_id);

    let response = env
        .client
        .get(env.url("/api/orders/user"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["orders"][0]["product"]["name"],
        "Product is no longer available"
    );
    assert!(body["orders"][0]["product"]["image_url"].is_null());

    let other = env.user_token("stranger@example.com").await;
    let response = env
        .client
        .get(env.url("/api/orders/user"))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn test_imagekit_auth() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .get(env.url("/api/imagekit-auth"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let token = env.user_token("uploader@example.com").await;
    let response = env
        .client
        .get(env.url("/api/imagekit-auth"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["signature"].as_str().unwrap().len(), 40);
    let expire = body["expire"].as_i64().unwrap();
    assert!(expire > Utc::now().timestamp() + 29 * 60);
}

#[tokio::test]
async fn test_admin_stale_order_report() {
    let env = TestEnvironment::new().await;
    let admin = env.admin_token().await;
    let user = env.user_token("waiting@example.com").await;

    let mut stale = Order::new_pending(
        "U-old",
        "P-old",
        ImageVariant::new(VariantType::Wide, License::Commercial, dec!(49)),
        "order_stale",
    );
    stale.created_at = Utc::now() - Duration::minutes(90);
    env.orders.insert(stale.clone());
    env.orders.insert(Order::new_pending(
        "U-new",
        "P-new",
        ImageVariant::new(VariantType::Square, License::Personal, dec!(5)),
        "order_fresh",
    ));

    let response = env
        .client
        .get(env.url("/api/admin/orders/stale"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = env
        .client
        .get(env.url("/api/admin/orders/stale?older_than_minutes=60"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["older_than_minutes"], 60);
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["orders"][0]["id"], stale.id.as_str());

    // Reporting never settles anything
    assert_eq!(env.orders.get(&stale.id).unwrap().status, OrderStatus::Pending);

    let response = env
        .client
        .get(env.url("/api/admin/orders/stale?older_than_minutes=0"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = env
        .client
        .post(env.url("/api/admin/setup-tables"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_request_validation() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .post(env.url("/api/auth/login"))
        .header("content-type", "text/plain")
        .body("email=a")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 415);
}
