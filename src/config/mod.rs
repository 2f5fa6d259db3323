use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_eventbridge::Client as EventBridgeClient;
use aws_sdk_ssm::Client as SsmClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::EventConfig;
use crate::repositories::table_manager::TableNames;
use crate::services::SmtpSettings;

pub const ENV_PREFIX: &str = "IMAGESHOP";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Environment variable missing: {name}")]
    MissingEnvironmentVariable { name: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub payment: PaymentConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub cdn: CdnConfig,
    pub events: EventsConfig,
    pub orders: OrdersConfig,
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_products_table")]
    pub products_table_name: String,
    #[serde(default = "default_categories_table")]
    pub categories_table_name: String,
    #[serde(default = "default_users_table")]
    pub users_table_name: String,
    #[serde(default = "default_orders_table")]
    pub orders_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the DynamoDB endpoint, e.g. for DynamoDB Local
    #[serde(default)]
    pub dynamodb_endpoint: Option<String>,
    /// Create missing tables before serving
    #[serde(default)]
    pub create_tables: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

#[derive(Clone, Deserialize)]
pub struct PaymentConfig {
    #[serde(default = "default_gateway_url")]
    pub payment_gateway_url: String,
    #[serde(default)]
    pub razorpay_key_id: String,
    #[serde(default)]
    pub razorpay_key_secret: String,
    #[serde(default)]
    pub razorpay_webhook_secret: String,
    #[serde(default = "default_currency")]
    pub payment_currency: String,
    #[serde(default = "default_gateway_timeout")]
    pub payment_timeout_seconds: u64,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub session_secret: String,
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    /// Seeded as an admin account at startup when both are set
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl AuthConfig {
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub mail_host: String,
    #[serde(default = "default_mail_port")]
    pub mail_port: u16,
    #[serde(default)]
    pub mail_username: String,
    #[serde(default)]
    pub mail_password: String,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
    #[serde(default)]
    pub mail_starttls: bool,
}

#[derive(Clone, Deserialize)]
pub struct CdnConfig {
    #[serde(default)]
    pub imagekit_public_key: String,
    #[serde(default)]
    pub imagekit_private_key: String,
    #[serde(default)]
    pub imagekit_url_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub events_enabled: bool,
    #[serde(default = "default_event_bus_name")]
    pub event_bus_name: String,
    #[serde(default = "default_event_source_name")]
    pub event_source_name: String,
    #[serde(default = "default_event_retry_attempts")]
    pub event_retry_attempts: u32,
    #[serde(default = "default_event_timeout")]
    pub event_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    #[serde(default = "default_stale_order_minutes")]
    pub stale_order_minutes: i64,
    /// SSM path under which missing secrets are looked up
    #[serde(default)]
    pub parameter_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
    pub eventbridge_client: EventBridgeClient,
    pub parameter_store: Arc<ParameterStoreConfig>,
}

pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("payment_gateway_url", &self.payment_gateway_url)
            .field("razorpay_key_id", &redacted(&self.razorpay_key_id))
            .field("razorpay_key_secret", &redacted(&self.razorpay_key_secret))
            .field("razorpay_webhook_secret", &redacted(&self.razorpay_webhook_secret))
            .field("payment_currency", &self.payment_currency)
            .finish()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &redacted(&self.session_secret))
            .field("session_ttl_days", &self.session_ttl_days)
            .field("admin_email", &self.admin_email)
            .field(
                "admin_password",
                &self.admin_password.as_deref().map(redacted),
            )
            .finish()
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("mail_host", &self.mail_host)
            .field("mail_port", &self.mail_port)
            .field("mail_username", &redacted(&self.mail_username))
            .field("mail_password", &redacted(&self.mail_password))
            .field("mail_from", &self.mail_from)
            .finish()
    }
}

impl std::fmt::Debug for CdnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdnConfig")
            .field("imagekit_public_key", &redacted(&self.imagekit_public_key))
            .field("imagekit_private_key", &redacted(&self.imagekit_private_key))
            .field("imagekit_url_endpoint", &self.imagekit_url_endpoint)
            .finish()
    }
}

/// Reads one section from `IMAGESHOP_*` variables. Keys map to field names
/// lowercased, so `IMAGESHOP_MAIL_PORT` fills `mail_port`.
fn load_section<T: DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

macro_rules! section_from_env {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl $ty {
                pub fn from_env() -> Result<Self, ConfigError> {
                    load_section($name)
                }
            }
        )*
    };
}

section_from_env! {
    ServerConfig => "server",
    DatabaseConfig => "database",
    ObservabilityConfig => "observability",
    PaymentConfig => "payment",
    AuthConfig => "auth",
    MailConfig => "mail",
    CdnConfig => "cdn",
    EventsConfig => "events",
    OrdersConfig => "orders",
}

/// Secrets without a usable default; key is the lowercase env suffix
pub const REQUIRED_SECRETS: [&str; 9] = [
    "razorpay_key_id",
    "razorpay_key_secret",
    "razorpay_webhook_secret",
    "session_secret",
    "mail_host",
    "mail_username",
    "mail_password",
    "imagekit_public_key",
    "imagekit_private_key",
];

/// Everything that does not need AWS clients
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub payment: PaymentConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub cdn: CdnConfig,
    pub events: EventsConfig,
    pub orders: OrdersConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            mail: MailConfig::from_env()?,
            cdn: CdnConfig::from_env()?,
            events: EventsConfig::from_env()?,
            orders: OrdersConfig::from_env()?,
        })
    }

    fn secret(&self, key: &str) -> Option<&String> {
        match key {
            "razorpay_key_id" => Some(&self.payment.razorpay_key_id),
            "razorpay_key_secret" => Some(&self.payment.razorpay_key_secret),
            "razorpay_webhook_secret" => Some(&self.payment.razorpay_webhook_secret),
            "session_secret" => Some(&self.auth.session_secret),
            "mail_host" => Some(&self.mail.mail_host),
            "mail_username" => Some(&self.mail.mail_username),
            "mail_password" => Some(&self.mail.mail_password),
            "imagekit_public_key" => Some(&self.cdn.imagekit_public_key),
            "imagekit_private_key" => Some(&self.cdn.imagekit_private_key),
            _ => None,
        }
    }

    fn secret_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "razorpay_key_id" => Some(&mut self.payment.razorpay_key_id),
            "razorpay_key_secret" => Some(&mut self.payment.razorpay_key_secret),
            "razorpay_webhook_secret" => Some(&mut self.payment.razorpay_webhook_secret),
            "session_secret" => Some(&mut self.auth.session_secret),
            "mail_host" => Some(&mut self.mail.mail_host),
            "mail_username" => Some(&mut self.mail.mail_username),
            "mail_password" => Some(&mut self.mail.mail_password),
            "imagekit_public_key" => Some(&mut self.cdn.imagekit_public_key),
            "imagekit_private_key" => Some(&mut self.cdn.imagekit_private_key),
            _ => None,
        }
    }

    /// Required secrets that are still empty
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        REQUIRED_SECRETS
            .iter()
            .copied()
            .filter(|key| {
                self.secret(key)
                    .map(|value| value.trim().is_empty())
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Fills missing secrets from Parameter Store when a prefix is configured,
    /// then fails on the first one still missing.
    pub async fn resolve_secrets(
        &mut self,
        parameter_store: Option<&ParameterStoreConfig>,
    ) -> Result<(), ConfigError> {
        let missing = self.missing_secrets();
        let prefix = self.orders.parameter_prefix.clone().filter(|p| !p.is_empty());

        for key in missing {
            let resolved = match (parameter_store, prefix.as_deref()) {
                (Some(store), Some(prefix)) => {
                    let name = format!("{}/{}", prefix.trim_end_matches('/'), key);
                    Some(store.get_parameter(&name).await?)
                }
                _ => None,
            };

            match (resolved, self.secret_mut(key)) {
                (Some(value), Some(slot)) if !value.trim().is_empty() => *slot = value,
                _ => {
                    return Err(ConfigError::MissingEnvironmentVariable {
                        name: format!("{}_{}", ENV_PREFIX, key.to_uppercase()),
                    })
                }
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(message: &str) -> Result<(), ConfigError> {
            Err(ConfigError::ValidationError {
                message: message.to_string(),
            })
        }

        if self.server.port == 0 {
            return invalid("Server port cannot be 0");
        }
        if self.server.request_timeout_seconds == 0 {
            return invalid("Request timeout cannot be 0");
        }
        if [
            &self.database.products_table_name,
            &self.database.categories_table_name,
            &self.database.users_table_name,
            &self.database.orders_table_name,
        ]
        .iter()
        .any(|name| name.is_empty())
        {
            return invalid("Table names cannot be empty");
        }
        if self.payment.payment_currency.len() != 3
            || !self
                .payment
                .payment_currency
                .chars()
                .all(|c| c.is_ascii_uppercase())
        {
            return invalid("Payment currency must be a three-letter ISO code");
        }
        if self.auth.session_ttl_days <= 0 {
            return invalid("Session lifetime must be positive");
        }
        if self.auth.admin_email.is_some() != self.auth.admin_password.is_some() {
            return invalid("Admin email and password must be set together");
        }
        if self.mail.mail_port == 0 {
            return invalid("Mail port cannot be 0");
        }
        if self.orders.stale_order_minutes <= 0 {
            return invalid("Stale order window must be positive");
        }

        Ok(())
    }
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let mut settings = Settings::from_env()?;
        settings.validate()?;

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.database.region.clone()))
            .load()
            .await;

        let dynamodb_client = match &settings.database.dynamodb_endpoint {
            Some(endpoint) => {
                let dynamodb_config = aws_sdk_dynamodb::config::Builder::from(&aws_config)
                    .endpoint_url(endpoint)
                    .build();
                DynamoDbClient::from_conf(dynamodb_config)
            }
            None => DynamoDbClient::new(&aws_config),
        };
        let eventbridge_client = EventBridgeClient::new(&aws_config);
        let parameter_store = Arc::new(ParameterStoreConfig::new(
            SsmClient::new(&aws_config),
            Duration::from_secs(5 * 60),
        ));

        settings
            .resolve_secrets(Some(parameter_store.as_ref()))
            .await?;

        let Settings {
            server,
            database,
            observability,
            payment,
            auth,
            mail,
            cdn,
            events,
            orders,
        } = settings;

        let config = Config {
            aws: AwsConfig {
                region: database.region.clone(),
                dynamodb_client,
                eventbridge_client,
                parameter_store,
            },
            server,
            database,
            observability,
            payment,
            auth,
            mail,
            cdn,
            events,
            orders,
        };

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);

        Ok(config)
    }
}

impl DatabaseConfig {
    pub fn table_names(&self) -> TableNames {
        TableNames {
            products: self.products_table_name.clone(),
            categories: self.categories_table_name.clone(),
            users: self.users_table_name.clone(),
            orders: self.orders_table_name.clone(),
        }
    }
}

impl MailConfig {
    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.mail_host.clone(),
            port: self.mail_port,
            username: self.mail_username.clone(),
            password: self.mail_password.clone(),
            from: self.mail_from.clone(),
            starttls: self.mail_starttls,
        }
    }
}

impl EventsConfig {
    pub fn event_config(&self) -> EventConfig {
        EventConfig {
            event_bus_name: self.event_bus_name.clone(),
            source_name: self.event_source_name.clone(),
            retry_attempts: self.event_retry_attempts,
            timeout_seconds: self.event_timeout_seconds,
            enabled: self.events_enabled,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        {
            let cache = self.cache.read().await;
            if let Some((value, fetched_at)) = cache.get(name) {
                if fetched_at.elapsed() < self.cache_ttl {
                    debug!("Parameter found in cache: {}", name);
                    return Ok(value.clone());
                }
            }
        }

        debug!("Fetching parameter from AWS SSM: {}", name);
        let result = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = result
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?
            .to_string();

        self.cache
            .write()
            .await
            .insert(name.to_string(), (value.clone(), Instant::now()));

        Ok(value)
    }

    pub async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    1024 * 1024 // 1MB
}

pub(crate) fn default_products_table() -> String {
    "ImageShopProducts".to_string()
}

pub(crate) fn default_categories_table() -> String {
    "ImageShopCategories".to_string()
}

pub(crate) fn default_users_table() -> String {
    "ImageShopUsers".to_string()
}

pub(crate) fn default_orders_table() -> String {
    "ImageShopOrders".to_string()
}

pub(crate) fn default_region() -> String {
    "us-east-1".to_string()
}

pub(crate) fn default_service_name() -> String {
    "imageshop-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) fn default_gateway_url() -> String {
    "https://api.razorpay.com".to_string()
}

pub(crate) fn default_currency() -> String {
    "USD".to_string()
}

pub(crate) fn default_gateway_timeout() -> u64 {
    10
}

pub(crate) fn default_session_ttl_days() -> i64 {
    30
}

pub(crate) fn default_mail_port() -> u16 {
    2525
}

pub(crate) fn default_mail_from() -> String {
    "\"ImageKit Shop\" <noreply@imagekitshop.com>".to_string()
}

pub(crate) fn default_event_bus_name() -> String {
    "default".to_string()
}

pub(crate) fn default_event_source_name() -> String {
    "imageshop.orders".to_string()
}

pub(crate) fn default_event_retry_attempts() -> u32 {
    3
}

pub(crate) fn default_event_timeout() -> u64 {
    30
}

pub(crate) fn default_stale_order_minutes() -> i64 {
    30
}
