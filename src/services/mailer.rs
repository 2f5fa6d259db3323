use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, instrument};

use crate::models::Order;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A single outgoing plain-text email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Payment confirmation sent after a captured payment
pub fn confirmation_email(to: &str, order: &Order, product_name: &str) -> EmailMessage {
    let body = format!(
        "Thank you for your purchase!\n\
         \n\
         Order Details:\n\
         - Order ID: {}\n\
         - Product: {}\n\
         - Version: {}\n\
         - License: {}\n\
         - Price: ${:.2}\n\
         \n\
         Your image is now available in your orders page.\n\
         Thank you for shopping with ImageKit Shop!",
        order.short_id(),
        product_name,
        order.variant.variant_type,
        order.variant.license,
        order.amount,
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Payment Confirmation - ImageKit Shop".to_string(),
        body,
    }
}

/// SMTP settings for [`SmtpMailer`]
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub starttls: bool,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        let transport = builder
            .port(settings.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from: settings.from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, message), fields(subject = %message.subject, otel.kind = "client"))]
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message.to.parse()?)
            .subject(message.subject)
            .body(message.body)?;

        self.transport.send(email).await?;
        info!("Email delivered to SMTP relay");
        Ok(())
    }
}
