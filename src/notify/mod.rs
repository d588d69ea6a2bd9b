//! Outbound email notifications for received problem reports
//!
//! [`Notifier`] is the seam between the upload pipeline and mail delivery.
//! Production deployments use SMTP or the local sendmail binary via lettre;
//! [`LogNotifier`] and [`RecordingNotifier`] stand in when no mail transport
//! is wanted (development, tests).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use crate::config::{NotifyConfig, NotifyTransport};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport setup failed: {0}")]
    Setup(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

/// One email to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub reply_to: Option<String>,
    pub body: String,
}

/// Mail delivery backend
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;

    /// Transport name for logs and health output
    fn name(&self) -> &'static str;
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|e: lettre::address::AddressError| {
        NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })
}

/// True when `address` is usable as a Reply-To or recipient
pub fn is_valid_address(address: &str) -> bool {
    parse_mailbox(address).is_ok()
}

fn build_message(from: &Mailbox, notification: &Notification) -> Result<Message> {
    let mut builder = Message::builder()
        .from(from.clone())
        .to(parse_mailbox(&notification.to)?)
        .subject(notification.subject.clone());

    if let Some(reply_to) = &notification.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }

    builder
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())
        .map_err(|e| NotifyError::Build(e.to_string()))
}

/// SMTP relay delivery
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(
        host: &str,
        port: u16,
        starttls: bool,
        credentials: Option<(String, String)>,
        from: &str,
    ) -> Result<Self> {
        let builder = if starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Setup(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let builder = builder.port(port);
        let builder = match credentials {
            Some((user, password)) => builder.credentials(Credentials::new(user, password)),
            None => builder,
        };

        info!(host, port, starttls, "SMTP notifier initialized");

        Ok(Self {
            mailer: Arc::new(builder.build()),
            from: parse_mailbox(from)?,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = build_message(&self.from, notification)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Delivery through the local `sendmail` binary
pub struct SendmailNotifier {
    transport: AsyncSendmailTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SendmailNotifier {
    pub fn new(from: &str) -> Result<Self> {
        Ok(Self {
            transport: AsyncSendmailTransport::<Tokio1Executor>::new(),
            from: parse_mailbox(from)?,
        })
    }
}

#[async_trait]
impl Notifier for SendmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = build_message(&self.from, notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "sendmail"
    }
}

/// Logs notifications instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            reply_to = ?notification.reply_to,
            size = notification.body.len(),
            "Notification (log transport)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every notification in memory; optionally fails each send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if self.fail {
            return Err(NotifyError::SendFailed("recording notifier set to fail".into()));
        }

        // Validate like a real transport would
        build_message(&parse_mailbox("recorder@example.org")?, notification)?;

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Build the notifier selected by configuration
pub fn from_config(config: &NotifyConfig) -> Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config.transport {
        NotifyTransport::Smtp => {
            let host = config
                .smtp_host
                .as_deref()
                .ok_or_else(|| NotifyError::Setup("smtp_host is not set".into()))?;
            let credentials = config
                .smtp_username
                .clone()
                .zip(config.smtp_password.clone());
            Arc::new(SmtpNotifier::new(
                host,
                config.smtp_port,
                config.smtp_starttls,
                credentials,
                &config.from,
            )?)
        }
        NotifyTransport::Sendmail => Arc::new(SendmailNotifier::new(&config.from)?),
        NotifyTransport::Log => Arc::new(LogNotifier::new()),
    };

    Ok(notifier)
}
