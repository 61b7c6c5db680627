use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

/// Best-effort operator notification channel. Delivery failures are logged
/// and swallowed; they must never reach the control loop.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, vm_id: &str, message: &str);
}

pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, vm_id: &str, message: &str) {
        log::error!("operator alert for {vm_id}: {message}");
    }
}

pub struct WebhookAlertSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, vm_id: &str, message: &str) {
        let payload = json!({
            "vm_id": vm_id,
            "message": message,
            "raised_at": Utc::now(),
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                log::warn!(
                    "alert webhook returned {} for {vm_id}",
                    response.status()
                );
            }
            Ok(_) => {}
            Err(e) => log::warn!("alert webhook delivery failed for {vm_id}: {e}"),
        }
    }
}
