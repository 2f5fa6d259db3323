// Services module - business logic layer

pub mod auth_service;
pub mod catalog_service;
pub mod cdn_auth;
pub mod event_emitter;
pub mod mailer;
pub mod order_service;
pub mod payment_gateway;
pub mod webhook_service;

#[cfg(test)]
pub(crate) mod mocks;

pub use auth_service::{AdminSeed, AuthService};
pub use catalog_service::CatalogService;
pub use cdn_auth::CdnAuthService;
pub use event_emitter::{EventEmitter, EventEmitterError};
pub use mailer::{EmailMessage, MailError, Mailer, SmtpMailer, SmtpSettings};
pub use order_service::OrderService;
pub use payment_gateway::{GatewayError, PaymentGateway, RazorpayGateway};
pub use webhook_service::{sign_payload, verify_signature, WebhookService};
