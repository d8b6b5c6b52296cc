use async_trait::async_trait;
use aw_models::{AwError, Settings};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::alert::Alert;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), AwError>;
}

/// Mails alerts through a plain SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    relay: String,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn from_settings(settings: &Settings) -> Result<Self, AwError> {
        let relay = settings
            .smtp_server
            .clone()
            .ok_or_else(|| config_error("SMTP_SERVER is not set"))?;
        let from = settings
            .alert_from
            .as_deref()
            .ok_or_else(|| config_error("ALERT_FROM is not set"))?
            .parse::<Mailbox>()
            .map_err(|e| config_error(format!("invalid ALERT_FROM: {}", e)))?;

        let to = settings
            .alert_recipients()
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .map_err(|e| config_error(format!("invalid ALERT_TO {:?}: {}", addr, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(config_error("ALERT_TO is not set"));
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(relay.as_str())
            .port(settings.smtp_port)
            .build();

        Ok(Self {
            transport,
            relay: format!("{}:{}", relay, settings.smtp_port),
            from,
            to,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, alert), fields(metric = %alert.metric, kind = ?alert.kind))]
    async fn notify(&self, alert: &Alert) -> Result<(), AwError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(alert.subject());
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body())
            .map_err(|e| AwError::NotificationError { reason: e.to_string() })?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AwError::NotificationError {
                reason: format!("{}: {}", self.relay, e),
            })?;

        info!("Sent alert email via {}: {}", self.relay, alert.subject());
        Ok(())
    }
}

/// Used when no SMTP relay is configured; alerts still show up in the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), AwError> {
        warn!(metric = %alert.metric, "{}: {}", alert.subject(), alert.body());
        Ok(())
    }
}

pub fn build_notifier(settings: &Settings) -> Arc<dyn Notifier> {
    if !settings.smtp_enabled() {
        info!("SMTP alerting not configured, alerts will only be logged");
        return Arc::new(LogNotifier);
    }
    match SmtpNotifier::from_settings(settings) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            warn!("Falling back to log-only alerts: {}", e);
            Arc::new(LogNotifier)
        }
    }
}

fn config_error(reason: impl Into<String>) -> AwError {
    AwError::ConfigError { reason: reason.into() }
}
