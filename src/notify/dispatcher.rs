use crate::app_config::Notification;
use crate::drift::DriftReport;
use crate::notify::{DeliveryError, Mail, NotificationTransport};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{info, instrument, warn};

const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Sent,
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ack {
    pub attempts: usize,
}

#[derive(Debug, Clone)]
pub struct Recipient {
    from: String,
    to: String,
    subject: String,
}

impl Recipient {
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Recipient {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
        }
    }
}

impl From<&Notification> for Recipient {
    fn from(config: &Notification) -> Self {
        Recipient::new(config.from(), config.to(), config.subject())
    }
}

/// Delivers drift reports. A failed delivery never changes the report itself.
pub struct Dispatcher {
    transport: Arc<dyn NotificationTransport>,
    recipient: Recipient,
    retry_attempts: usize,
    backoff_factor: u64,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>, recipient: Recipient, retry_attempts: usize) -> Self {
        Dispatcher {
            transport,
            recipient,
            retry_attempts,
            backoff_factor: 250,
        }
    }

    /// Sends `report`, retrying failed deliveries with exponential backoff.
    #[instrument(skip_all, fields(device_id = %report.device()))]
    pub async fn send(&self, report: &DriftReport) -> Result<Ack, DeliveryError> {
        let mail = self.compose(report);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.backoff_factor)
            .max_delay(RETRY_MAX_DELAY)
            .map(jitter)
            .take(self.retry_attempts);

        info!("📨 Sending drift notification to {}...", self.recipient.to);
        let attempts = AtomicUsize::new(0);
        let (counter, mail) = (&attempts, &mail);
        Retry::spawn(strategy, || async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            self.transport.deliver(mail).await.inspect_err(|e| {
                warn!("⚠️ Sending drift notification... attempt {} failed, {}", attempt, e);
            })
        })
        .await?;

        let attempts = attempts.load(Ordering::SeqCst);
        info!("📨 Sending drift notification to {}... OK", self.recipient.to);
        Ok(Ack { attempts })
    }

    /// Sends `report` unless it shows no drift and sending is not forced.
    pub async fn dispatch(&self, report: &DriftReport, force: bool) -> NotificationOutcome {
        if !report.has_drift() && !force {
            info!(device_id = %report.device(), "📭 No drift detected, skipping notification");
            return NotificationOutcome::Skipped;
        }

        match self.send(report).await {
            Ok(_) => NotificationOutcome::Sent,
            Err(e) => NotificationOutcome::Failed { reason: e.to_string() },
        }
    }

    fn compose(&self, report: &DriftReport) -> Mail {
        let device = report.device();
        let (text_body, html_body) = if report.has_drift() {
            (report.body().to_string(), report.html().to_string())
        } else {
            (
                format!("No configuration changes on {}.\n", device),
                format!("<p>No configuration changes on {}.</p>\n", device),
            )
        };

        Mail {
            from: self.recipient.from.clone(),
            to: self.recipient.to.clone(),
            subject: format!("{}: {}", self.recipient.subject, device),
            text_body,
            html_body,
        }
    }
}
