//! SMTP transport via lettre.
//!
//! Port 465 uses implicit TLS; every other port uses STARTTLS. Certificates
//! are always verified.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{
        Attachment, Mailbox, MultiPart, SinglePart,
        header::{ContentType, HeaderName, HeaderValue},
    },
    transport::smtp::{Error as SmtpError, PoolConfig, authentication::Credentials},
};
use secrecy::ExposeSecret;

use super::{DeliveryError, MailTransport, OutgoingMessage, TransportFactory};
use crate::config::SmtpConfig;

/// Timeout for the verify handshake when a transport is built.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for individual SMTP socket operations.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(20);
/// Maximum pooled SMTP connections.
const POOL_SIZE: u32 = 5;

/// Builds pooled SMTP transports from configuration.
#[derive(Debug, Clone)]
pub struct SmtpTransportFactory {
    config: SmtpConfig,
}

impl SmtpTransportFactory {
    #[must_use]
    pub const fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SmtpError> {
        let credentials = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        let builder = if self.config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
        };

        Ok(builder
            .port(self.config.port)
            .credentials(credentials)
            .timeout(Some(SOCKET_TIMEOUT))
            .pool_config(PoolConfig::new().max_size(POOL_SIZE))
            .build())
    }
}

#[async_trait]
impl TransportFactory for SmtpTransportFactory {
    async fn connect(&self) -> Result<Arc<dyn MailTransport>, DeliveryError> {
        let mailer = self.build().map_err(|e| smtp_error(&e))?;

        match tokio::time::timeout(CONNECT_TIMEOUT, mailer.test_connection()).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                return Err(DeliveryError::new(None, "SMTP server rejected NOOP"));
            }
            Ok(Err(e)) => return Err(smtp_error(&e)),
            Err(_) => {
                return Err(DeliveryError::new(
                    None,
                    format!("connection timeout after {}s", CONNECT_TIMEOUT.as_secs()),
                ));
            }
        }

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            implicit_tls = self.config.implicit_tls(),
            "SMTP transport verified"
        );

        Ok(Arc::new(SmtpMailTransport { mailer }))
    }
}

/// A verified, pooled SMTP connection.
struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        let email = build_message(message)?;
        self.mailer.send(email).await.map_err(|e| smtp_error(&e))?;
        Ok(())
    }
}

fn build_message(message: &OutgoingMessage) -> Result<Message, DeliveryError> {
    let invalid =
        |e: &dyn std::fmt::Display| DeliveryError::new(None, format!("invalid message: {e}"));

    let from_address: Address = message
        .from_address
        .as_str()
        .parse()
        .map_err(|e| invalid(&e))?;

    let mut builder = Message::builder()
        .message_id(Some(message.message_id.clone()))
        .from(Mailbox::new(Some(message.from_name.clone()), from_address))
        .subject(message.subject.clone());

    for to in &message.to {
        let address: Address = to.as_str().parse().map_err(|e| invalid(&e))?;
        builder = builder.to(Mailbox::new(None, address));
    }

    for (name, value) in &message.headers {
        let name = HeaderName::new_from_ascii(name.clone()).map_err(|e| invalid(&e))?;
        builder = builder.raw_header(HeaderValue::new(name, value.clone()));
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::html(message.html.clone()));
    for attachment in &message.attachments {
        let content_type = ContentType::parse(&attachment.content_type).map_err(|e| invalid(&e))?;
        body = body.singlepart(
            Attachment::new(attachment.filename.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    builder.multipart(body).map_err(|e| invalid(&e))
}

/// Convert a lettre error, keeping the SMTP reply code when there is one.
fn smtp_error(e: &SmtpError) -> DeliveryError {
    let code = e.status().and_then(|code| code.to_string().parse::<u16>().ok());
    DeliveryError::new(code, e.to_string())
}
