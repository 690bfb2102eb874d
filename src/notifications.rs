use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::{MatchEvent, Notifier};
use crate::AppError;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes onto an unbounded channel and never waits for delivery.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<MatchEvent>,
}

impl Notifier for ChannelNotifier {
    fn publish(&self, event: MatchEvent) {
        let match_id = event.match_id;
        let event_type = event.event.as_str();
        if self.tx.send(event).is_err() {
            tracing::warn!(match_id, event = event_type, "Notification dispatcher is gone, dropping event");
        }
    }
}

pub fn channel() -> (ChannelNotifier, mpsc::UnboundedReceiver<MatchEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelNotifier { tx }, rx)
}

/// Forwards each event to the webhook, or only logs it when none is configured.
pub fn spawn_dispatcher(
    mut rx: mpsc::UnboundedReceiver<MatchEvent>,
    webhook_url: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_default();

        while let Some(event) = rx.recv().await {
            let Some(url) = webhook_url.as_deref() else {
                tracing::info!(
                    event = event.event.as_str(),
                    kind = %event.kind,
                    match_id = event.match_id,
                    "Match notification (no webhook configured)"
                );
                continue;
            };

            if let Err(e) = deliver(&client, url, &event).await {
                tracing::warn!(
                    error = %e,
                    event = event.event.as_str(),
                    match_id = event.match_id,
                    "Failed to deliver match notification"
                );
            }
        }

        tracing::debug!("Notification dispatcher stopped");
    })
}

async fn deliver(client: &reqwest::Client, url: &str, event: &MatchEvent) -> Result<(), AppError> {
    let response = client
        .post(url)
        .json(event)
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("Notification webhook unreachable: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Internal(format!(
            "Notification webhook error: {} - {}",
            status, body
        )));
    }

    tracing::debug!(event = event.event.as_str(), match_id = event.match_id, "Match notification delivered");
    Ok(())
}
