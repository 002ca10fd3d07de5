//! Retrying notification dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use uuid::Uuid;

use bluelender_core::Email;

use super::{
    DeliveryReceipt, DispatchError, MailTransport, Notifier, OutgoingMessage,
    Recipients, SendRequest, TransportFactory,
};
use crate::config::SmtpConfig;

/// How long a verified transport is reused before it is rebuilt.
const TRANSPORT_TTL: Duration = Duration::from_secs(30 * 60);

/// Bounded exponential backoff for transient delivery failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry`.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(retry))
    }
}

/// Sends notifications over a cached, verified SMTP transport.
///
/// The transport is built at most once per TTL window even when many sends
/// race on a cold cache. Validation failures and transport construction
/// failures are returned immediately; only transient delivery failures are
/// retried.
pub struct NotificationDispatcher {
    factory: Arc<dyn TransportFactory>,
    transports: Cache<(), Arc<dyn MailTransport>>,
    retry: RetryPolicy,
    from_name: String,
    from_address: Email,
    company_name: String,
    abuse_address: Email,
}

impl NotificationDispatcher {
    /// Create a dispatcher for the configured sender.
    #[must_use]
    pub fn new(config: &SmtpConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            transports: Cache::builder()
                .max_capacity(1)
                .time_to_live(TRANSPORT_TTL)
                .build(),
            retry: RetryPolicy::default(),
            from_name: config.from_name.clone(),
            from_address: config.from_address.clone(),
            company_name: config.company_name.clone(),
            abuse_address: config.abuse_address.clone(),
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the cached transport or build and verify a new one.
    async fn transport(&self) -> Result<Arc<dyn MailTransport>, DispatchError> {
        let factory = Arc::clone(&self.factory);
        self.transports
            .try_get_with((), async move { factory.connect().await })
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))
    }

    fn prepare(&self, request: SendRequest) -> Result<OutgoingMessage, DispatchError> {
        let to = validate_recipients(request.to)?;
        if request.subject.trim().is_empty() {
            return Err(DispatchError::EmptySubject);
        }
        if request.html.trim().is_empty() {
            return Err(DispatchError::EmptyBody);
        }

        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.from_address.domain());
        let abuse = self.abuse_address.as_str();
        let headers = vec![
            ("X-Priority".to_owned(), "3".to_owned()),
            (
                "X-Mailer".to_owned(),
                format!("{} Notifications", self.company_name),
            ),
            ("X-Company".to_owned(), self.company_name.clone()),
            (
                "X-Report-Abuse".to_owned(),
                format!("Please report abuse to {abuse}"),
            ),
            (
                "List-Unsubscribe".to_owned(),
                format!("<mailto:{abuse}?subject=unsubscribe>"),
            ),
        ];

        Ok(OutgoingMessage {
            message_id,
            from_name: self.from_name.clone(),
            from_address: self.from_address.clone(),
            to,
            subject: request.subject,
            html: request.html,
            headers,
            attachments: request.attachments,
        })
    }

    async fn deliver_with_retry(
        &self,
        transport: &dyn MailTransport,
        message: &OutgoingMessage,
    ) -> Result<(), DispatchError> {
        let mut retry = 0;
        loop {
            match transport.deliver(message).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay(retry);
                    tracing::warn!(
                        message_id = %message.message_id,
                        attempt = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient SMTP failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(source) => {
                    return Err(DispatchError::Delivery {
                        attempts: retry + 1,
                        source,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn send(&self, request: SendRequest) -> Result<DeliveryReceipt, DispatchError> {
        let message = self.prepare(request)?;
        let transport = self.transport().await?;

        self.deliver_with_retry(transport.as_ref(), &message)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    message_id = %message.message_id,
                    subject = %message.subject,
                    error = %e,
                    "Email delivery failed"
                );
            })?;

        tracing::info!(
            message_id = %message.message_id,
            recipients = message.to.len(),
            subject = %message.subject,
            "Email sent successfully"
        );

        Ok(DeliveryReceipt {
            message_id: message.message_id,
            accepted: message.to,
        })
    }
}

fn validate_recipients(to: Recipients) -> Result<Vec<Email>, DispatchError> {
    match to {
        Recipients::One(address) => Email::parse(address.trim())
            .map(|email| vec![email])
            .map_err(|_| DispatchError::InvalidRecipient(address)),
        Recipients::Many(addresses) => {
            let valid: Vec<Email> = addresses
                .iter()
                .filter_map(|address| match Email::parse(address.trim()) {
                    Ok(email) => Some(email),
                    Err(e) => {
                        tracing::warn!(address = %address, error = %e, "Dropping invalid recipient");
                        None
                    }
                })
                .collect();
            if valid.is_empty() {
                Err(DispatchError::NoValidRecipients)
            } else {
                Ok(valid)
            }
        }
    }
}
