use crate::app_config::TransportConfig;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("unable to build message: {0}")]
    Message(String),
    #[error("unable to deliver message: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, mail: &Mail) -> Result<(), DeliveryError>;
}

pub enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl MailTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, DeliveryError> {
        match config {
            TransportConfig::Smtp {
                host,
                port,
                username,
                password,
                starttls,
            } => {
                if !starttls {
                    warn!("⚠️ SMTP STARTTLS is disabled, notifications are sent unencrypted");
                }

                let mut builder = if *starttls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                        .map_err(|e| DeliveryError::Transport(format!("unable to create SMTP transport: {}", e)))?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                }
                .port(*port);

                if let (Some(username), Some(password)) = (username, password) {
                    builder = builder.credentials(Credentials::new(username.clone(), password.expose_secret().to_string()));
                }

                Ok(MailTransport::Smtp(builder.build()))
            }
            TransportConfig::File { directory } => {
                std::fs::create_dir_all(directory).map_err(|e| {
                    DeliveryError::Transport(format!("unable to create mail directory '{}': {}", directory.display(), e))
                })?;
                Ok(MailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(directory)))
            }
        }
    }
}

impl fmt::Debug for MailTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailTransport::Smtp(_) => f.write_str("MailTransport::Smtp"),
            MailTransport::File(_) => f.write_str("MailTransport::File"),
        }
    }
}

#[async_trait]
impl NotificationTransport for MailTransport {
    #[instrument(skip_all, fields(to = %mail.to))]
    async fn deliver(&self, mail: &Mail) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(mailbox(&mail.from)?)
            .to(mailbox(&mail.to)?)
            .subject(mail.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(mail.text_body.clone(), mail.html_body.clone()))
            .map_err(|e| DeliveryError::Message(e.to_string()))?;

        match self {
            MailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| DeliveryError::Transport(e.to_string()))?;
            }
            MailTransport::File(file) => {
                file.send(message).await.map_err(|e| DeliveryError::Transport(e.to_string()))?;
            }
        }

        debug!("📨 Delivered '{}'", mail.subject);
        Ok(())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse::<Mailbox>().map_err(|e| DeliveryError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
