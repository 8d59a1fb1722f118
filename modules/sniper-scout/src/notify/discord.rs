use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::backend::NotifyBackend;
use super::Notification;
use crate::sources::http_client;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(15);

/// Discord incoming webhook notification backend. Posts one embed per
/// notification.
pub struct DiscordWebhook {
    webhook_url: String,
    http: reqwest::Client,
}

impl DiscordWebhook {
    pub fn new(webhook_url: String) -> anyhow::Result<Self> {
        Ok(Self {
            webhook_url,
            http: http_client(WEBHOOK_TIMEOUT)?,
        })
    }

    fn payload(notification: &Notification) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = notification
            .fields
            .iter()
            .map(|f| json!({"name": f.name, "value": f.value}))
            .collect();

        json!({
            "embeds": [{
                "title": notification.title,
                "description": notification.summary,
                "color": notification.color,
                "fields": fields,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotifyBackend for DiscordWebhook {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&Self::payload(notification))
            .send()
            .await
            .context("Discord webhook request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Discord webhook returned non-success");
            anyhow::bail!("Discord webhook returned {status}");
        }

        Ok(())
    }
}
