pub mod config;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;

pub use config::{Config, ConfigError, ParameterStoreConfig};
pub use handlers::{create_app, AppServices};
pub use observability::{init_observability, shutdown_observability, Metrics};
