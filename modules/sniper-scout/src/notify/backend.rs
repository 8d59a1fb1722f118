use async_trait::async_trait;

use super::Notification;

/// Pluggable delivery channel for run notifications.
#[async_trait]
pub trait NotifyBackend: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}
