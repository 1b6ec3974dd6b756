use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Welcome,
    PasswordReset,
}

/// Outbound messages to users (welcome mail, reset link).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        kind: NotificationKind,
        recipient: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Records notifications in the log instead of delivering them.
///
/// Template data is not logged because a reset link carries the raw secret.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        kind: NotificationKind,
        recipient: &str,
        _data: serde_json::Value,
    ) -> anyhow::Result<()> {
        info!(?kind, %recipient, "notification queued");
        Ok(())
    }
}

/// Sends on a background task; a failed delivery is logged and never
/// reaches the request that triggered it.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    kind: NotificationKind,
    recipient: String,
    data: serde_json::Value,
) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(kind, &recipient, data).await {
            warn!(error = %e, ?kind, %recipient, "notification failed");
        }
    });
}
