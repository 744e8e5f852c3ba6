//! Notifier implementations
//!
//! Alert delivery is fire-and-forget: a webhook that cannot be reached is a
//! logged warning, never a failed rollback cycle.

use std::time::Duration;

use async_trait::async_trait;
use deploy_sentinel_core::{Notifier, Severity};
use tracing::{error, info, warn};

/// Posts alerts as JSON to a webhook endpoint
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("deploy-sentinel/0.3")
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, title: &str, message: &str, severity: Severity) {
        let payload = serde_json::json!({
            "title": title,
            "message": message,
            "severity": severity.as_str(),
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(title, severity = severity.as_str(), "notification delivered");
            }
            Ok(response) => {
                warn!(title, status = %response.status(), "webhook rejected notification");
            }
            Err(e) => {
                warn!(title, error = %e, "notification delivery failed");
            }
        }
    }
}

/// Logs alerts locally when no webhook is configured
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => info!(title, "{}", message),
            Severity::Warning => warn!(title, "{}", message),
            Severity::Error => error!(title, "{}", message),
        }
    }
}
