use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};
use tracing::{info, warn};

use imageshop_rs::{
    create_app, init_observability,
    observability::Metrics,
    repositories::{
        DynamoDbCategoryRepository, DynamoDbOrderRepository, DynamoDbProductRepository,
        DynamoDbUserRepository, TableManager,
    },
    services::{
        AdminSeed, AuthService, CatalogService, CdnAuthService, EventEmitter, OrderService, RazorpayGateway,
        SmtpMailer, WebhookService,
    },
    shutdown_observability, AppServices, Config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging is not up yet, so configuration failures go to stderr
    let config = match Config::from_environment().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_observability(&config.observability)?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!(
        "DynamoDB Tables: products={}, categories={}, users={}, orders={}",
        config.database.products_table_name,
        config.database.categories_table_name,
        config.database.users_table_name,
        config.database.orders_table_name
    );

    let metrics = Arc::new(Metrics::new()?);

    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());
    let table_manager = Arc::new(TableManager::new(dynamodb_client.clone()));
    let region = config.database.region.clone();

    let product_repository = Arc::new(DynamoDbProductRepository::new(
        dynamodb_client.clone(),
        config.database.products_table_name.clone(),
        region.clone(),
    ));
    let category_repository = Arc::new(DynamoDbCategoryRepository::new(
        dynamodb_client.clone(),
        config.database.categories_table_name.clone(),
        region.clone(),
    ));
    let user_repository = Arc::new(DynamoDbUserRepository::new(
        dynamodb_client.clone(),
        config.database.users_table_name.clone(),
        region.clone(),
    ));
    let order_repository = Arc::new(DynamoDbOrderRepository::new(
        dynamodb_client,
        config.database.orders_table_name.clone(),
        region,
    ));
    info!("Repositories initialized");

    let gateway = Arc::new(RazorpayGateway::new(
        &config.payment.payment_gateway_url,
        &config.payment.razorpay_key_id,
        &config.payment.razorpay_key_secret,
        std::time::Duration::from_secs(config.payment.payment_timeout_seconds),
    )?);
    let mailer = Arc::new(SmtpMailer::new(&config.mail.smtp_settings())?);

    let event_emitter = if config.events.events_enabled {
        match EventEmitter::new(
            config.aws.eventbridge_client.clone(),
            config.events.event_config(),
        ) {
            Ok(emitter) => {
                info!(
                    "Events bus_name={}, source_name={}",
                    config.events.event_bus_name, config.events.event_source_name
                );
                Some(Arc::new(emitter))
            }
            Err(e) => {
                warn!(
                    "Failed to initialize event emitter: {}, continuing without events",
                    e
                );
                None
            }
        }
    } else {
        info!("Event emission disabled");
        None
    };

    let auth_service = Arc::new(AuthService::new(
        user_repository.clone(),
        config.auth.session_secret.clone(),
        chrono::Duration::days(config.auth.session_ttl_days),
    ));

    if config.database.create_tables {
        info!("Creating missing tables");
        table_manager
            .create_all_tables(&config.database.table_names())
            .await?;
    }
    if let Some((email, password)) = config.auth.admin_credentials() {
        match auth_service.ensure_admin(email, password).await? {
            AdminSeed::Created { user_id } => info!("Admin account created: {}", user_id),
            AdminSeed::Existing => info!("Admin account already present"),
        }
    }
    let catalog_service = Arc::new(CatalogService::new(
        product_repository.clone(),
        category_repository,
        config.cdn.imagekit_url_endpoint.clone(),
    ));

    let mut order_service = OrderService::new(
        order_repository.clone(),
        product_repository.clone(),
        gateway,
        config.payment.payment_currency.clone(),
        config.cdn.imagekit_url_endpoint.clone(),
        config.orders.stale_order_minutes,
    );
    let mut webhook_service = WebhookService::new(
        order_repository,
        user_repository,
        product_repository,
        mailer,
        config.payment.razorpay_webhook_secret.clone(),
    );
    if let Some(emitter) = event_emitter {
        order_service = order_service.with_event_emitter(emitter.clone());
        webhook_service = webhook_service.with_event_emitter(emitter);
    }

    let cdn_service = Arc::new(CdnAuthService::new(
        config.cdn.imagekit_private_key.clone(),
        config.cdn.imagekit_public_key.clone(),
        config.cdn.imagekit_url_endpoint.clone(),
    ));
    info!("Services initialized");

    let app = create_app(AppServices {
        metrics,
        auth: auth_service,
        catalog: catalog_service,
        orders: Arc::new(order_service),
        webhooks: Arc::new(webhook_service),
        cdn: cdn_service,
        table_manager,
        table_names: config.database.table_names(),
    })
    .layer(RequestBodyLimitLayer::new(config.server.max_request_size))
    .layer(TimeoutLayer::new(config.server.request_timeout()));

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler the server only stops when the process is killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown_observability().await;
}
