//! Notificador de cambios
//!
//! Fire-and-forget side channel. The reconciler hands a [`ChangeEvent`] to the
//! [`NotificationDispatcher`] after commit; a background worker drains the
//! bounded queue and delivers through a [`ChangeNotifier`]. Delivery failures
//! are logged by the worker and never reach the sync caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    fn headline(&self) -> &'static str {
        match self {
            ChangeKind::Created => "🆕 *New order*",
            ChangeKind::Updated => "🔄 *Order updated*",
            ChangeKind::Deleted => "🗑️ *Order deleted*",
        }
    }
}

/// Committed change of one aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub order_id: i64,
    pub last_modified: DateTime<Utc>,
    pub order: Order,
    pub containers: usize,
    pub tasks: usize,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Built with the URL stripped; it carries the bot token
    #[error("notification request failed: {0}")]
    Http(reqwest::Error),

    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}

/// Escape the characters Telegram's legacy Markdown treats as markup
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Human-readable summary of a change, Markdown formatted
pub fn format_summary(event: &ChangeEvent) -> String {
    let order = &event.order;
    let client = order.client_name.as_deref().map(escape_markdown).unwrap_or_else(|| "-".to_string());
    let status = order.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        event.kind.headline().to_string(),
        String::new(),
        format!("📦 Order: {}", escape_markdown(&order.order_number)),
        format!("👤 Client: {}", client),
        format!("📍 Status: {}", status),
        format!("🚢 Departure: {}", format_date(order.departure_date)),
        format!("⏱️ ETA: {}", format_date(order.eta_date)),
    ];

    if event.kind != ChangeKind::Deleted {
        lines.push(format!("🧱 Containers: {} · Tasks: {}", event.containers, event.tasks));
    }
    lines.push(format!("🕒 Modified: {}", event.last_modified.format("%Y-%m-%d %H:%M:%S UTC")));

    lines.join("\n")
}

/// Delivery through the Telegram Bot API
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Http(e.without_url()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl ChangeNotifier for TelegramNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&json!({
                "chat_id": self.chat_id,
                "text": format_summary(event),
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("📨 Telegram notified for order {}", event.order.order_number);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// Writes the summary to the log; used when no channel is configured
pub struct LogNotifier;

#[async_trait]
impl ChangeNotifier for LogNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        info!(
            order_number = %event.order.order_number,
            order_id = event.order_id,
            kind = ?event.kind,
            "📣 Order change"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Sending half of the notification queue
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<ChangeEvent>,
}

impl NotificationDispatcher {
    /// Start the worker. It stops once every dispatcher clone is dropped and
    /// the queue is drained.
    pub fn spawn(notifier: Arc<dyn ChangeNotifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<ChangeEvent>(capacity.max(1));

        let worker = tokio::spawn(async move {
            info!("📣 Notification worker started ({})", notifier.name());
            while let Some(event) = receiver.recv().await {
                if let Err(e) = notifier.notify(&event).await {
                    warn!(
                        "⚠️ Notification for order {} failed: {}",
                        event.order.order_number, e
                    );
                }
            }
            info!("📣 Notification worker stopped");
        });

        (Self { sender }, worker)
    }

    /// Enqueue without waiting. A full or closed queue drops the event.
    pub fn dispatch(&self, event: ChangeEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("⚠️ Notification queue full, dropping event for {}", event.order.order_number);
            }
            Err(TrySendError::Closed(event)) => {
                warn!("⚠️ Notification worker gone, dropping event for {}", event.order.order_number);
            }
        }
    }
}
