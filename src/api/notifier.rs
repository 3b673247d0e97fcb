//! Outbound mail delivery.
//!
//! One-time codes and reset credentials are delivered through a `Notifier`. Callers
//! await the result and decide what to persist based on it, so every implementation
//! must report failure instead of swallowing it.
//!
//! - `LogNotifier` logs the message and succeeds (local dev).
//! - `SmtpNotifier` relays through an SMTP server with STARTTLS.
//! - `WebhookNotifier` posts the message as JSON to a mail relay API.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::{str::FromStr, sync::Arc};
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Body carries a standing credential and must never reach the logs.
    #[serde(skip)]
    pub redact_body: bool,
}

impl EmailMessage {
    /// Body as it may appear in debug logs.
    #[must_use]
    pub fn loggable_body(&self) -> Option<&str> {
        (!self.redact_body).then_some(self.body.as_str())
    }
}

/// Mail delivery abstraction used by the auth flows.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message or return an error when it could not be handed off.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev notifier that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "notifier send stub"
        );
        match message.loggable_body() {
            Some(body) => debug!(to = %message.to, body = %body, "notifier message body"),
            None => debug!(to = %message.to, "notifier message body redacted"),
        }
        Ok(())
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    /// Build a STARTTLS relay transport.
    ///
    /// # Errors
    /// Returns an error if the relay host is invalid.
    pub fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<SecretString>,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("invalid SMTP relay host: {host}"))?
            .port(port);
        if let Some(username) = username {
            let password = password
                .map(|secret| secret.expose_secret().to_string())
                .unwrap_or_default();
            builder = builder.credentials(Credentials::new(username, password));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let email = Message::builder()
            .from(Mailbox::from_str(&message.from).context("invalid sender address")?)
            .to(Mailbox::from_str(&message.to).context("invalid recipient address")?)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("failed to build email")?;

        let response = self
            .transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        debug!("SMTP relay answered {:?}", response.code());
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build webhook client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(self.url.as_str())
            .json(message)
            .send()
            .await
            .context("mail relay request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("{} - {}", self.url, response.status()));
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifierKind {
    Log,
    Smtp,
    Webhook,
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "smtp" => Ok(Self::Smtp),
            "webhook" => Ok(Self::Webhook),
            _ => Err(format!("unknown notifier: {value}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NotifierConfig {
    kind: NotifierKind,
    smtp_host: Option<String>,
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<SecretString>,
    webhook_url: Option<String>,
}

impl NotifierConfig {
    #[must_use]
    pub fn new(kind: NotifierKind) -> Self {
        Self {
            kind,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            webhook_url: None,
        }
    }

    #[must_use]
    pub fn with_smtp(
        mut self,
        host: Option<String>,
        port: u16,
        username: Option<String>,
        password: Option<SecretString>,
    ) -> Self {
        self.smtp_host = host;
        self.smtp_port = port;
        self.smtp_username = username;
        self.smtp_password = password;
        self
    }

    #[must_use]
    pub fn with_webhook_url(mut self, url: Option<String>) -> Self {
        self.webhook_url = url;
        self
    }

    #[must_use]
    pub fn kind(&self) -> NotifierKind {
        self.kind
    }

    /// Build the configured notifier.
    ///
    /// # Errors
    /// Returns an error when a transport is selected without its required settings.
    pub fn build(self) -> Result<Arc<dyn Notifier>> {
        match self.kind {
            NotifierKind::Log => Ok(Arc::new(LogNotifier)),
            NotifierKind::Smtp => {
                let host = self
                    .smtp_host
                    .ok_or_else(|| anyhow!("missing required argument: --smtp-host"))?;
                Ok(Arc::new(SmtpNotifier::new(
                    &host,
                    self.smtp_port,
                    self.smtp_username,
                    self.smtp_password,
                )?))
            }
            NotifierKind::Webhook => {
                let url = self
                    .webhook_url
                    .ok_or_else(|| anyhow!("missing required argument: --webhook-url"))?;
                Ok(Arc::new(WebhookNotifier::new(url)?))
            }
        }
    }
}

/// Test notifier that keeps every message it was asked to send.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    messages: tokio::sync::Mutex<Vec<EmailMessage>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub(crate) async fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().await.clone()
    }

    /// Last word of the most recent body: the code or the new password.
    pub(crate) async fn last_secret(&self) -> Option<String> {
        let messages = self.messages.lock().await;
        let body = &messages.last()?.body;
        body.split_whitespace().last().map(str::to_string)
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}

/// Test notifier whose relay is always down.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingNotifier;

#[cfg(test)]
#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _message: &EmailMessage) -> Result<()> {
        Err(anyhow!("relay refused connection"))
    }
}
