use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;

use crate::models::{AlertEvent, AlertSubscription, ChannelKind};

const WEBHOOK_TIMEOUT_SECS: u64 = 10;
const WEBHOOK_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize)]
struct NotificationPayload {
    subscription_id: String,
    event_id: String,
    event_type: String,
    message: String,
    data: serde_json::Value,
    timestamp: String,
}

fn payload_for(subscription: &AlertSubscription, event: &AlertEvent, message: &str) -> NotificationPayload {
    NotificationPayload {
        subscription_id: subscription.id.clone(),
        event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        message: message.to_string(),
        data: event.event_data.clone(),
        timestamp: event.triggered_at.to_rfc3339(),
    }
}

/// # NDOC
/// component: `alerts::channels::NotificationChannel`
/// purpose: One delivery mechanism per `ChannelKind` (§4.7). `send` never propagates a transport
///   error up to the engine — it logs and returns `false` so one bad subscription can't halt a
///   batch of others.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, subscription: &AlertSubscription, event: &AlertEvent, message: &str) -> bool;
}

pub struct WebhookChannel {
    client: reqwest::Client,
    retries: u32,
}

impl WebhookChannel {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder().timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS)).build().unwrap_or_default(),
            retries: WEBHOOK_RETRIES,
        }
    }
}

impl Default for WebhookChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, subscription: &AlertSubscription, event: &AlertEvent, message: &str) -> bool {
        let Some(url) = &subscription.webhook_url else {
            warn!(target: "alerts", "no webhook URL for subscription {}", subscription.id);
            return false;
        };

        let payload = payload_for(subscription, event, message);

        for attempt in 0..self.retries {
            match self.client.post(url).json(&payload).send().await {
                Ok(response) if response.status().as_u16() < 300 => {
                    info!(target: "alerts", "webhook sent to {url}");
                    return true;
                }
                Ok(response) => {
                    // Non-2xx is a real response, not a transport failure: retrying won't help.
                    warn!(target: "alerts", "webhook to {url} returned {}", response.status());
                    return false;
                }
                Err(err) => {
                    warn!(target: "alerts", "webhook request failed (attempt {}): {err}", attempt + 1);
                }
            }
        }

        false
    }
}

/// Queues alerts for retrieval via MCP tool calls instead of pushing them. Mirrors the original
/// in-memory queue; a real deployment would back this with Redis, which is why the struct takes
/// the store as a constructor argument rather than using a process-global.
#[derive(Default)]
pub struct McpQueueChannel {
    pending: Mutex<HashMap<String, Vec<NotificationPayload>>>,
}

impl McpQueueChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self, user_id: &str) -> usize {
        self.pending.lock().unwrap().get(user_id).map(Vec::len).unwrap_or(0)
    }

    pub fn clear(&self, user_id: &str) -> usize {
        let mut pending = self.pending.lock().unwrap();
        pending.remove(user_id).map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationChannel for McpQueueChannel {
    async fn send(&self, subscription: &AlertSubscription, event: &AlertEvent, message: &str) -> bool {
        let payload = payload_for(subscription, event, message);
        let mut pending = self.pending.lock().unwrap();
        pending.entry(subscription.user_id.clone()).or_default().push(payload);
        info!(target: "alerts", "mcp alert queued for user {}", subscription.user_id);
        true
    }
}

/// Placeholder email delivery: logs and reports success, the way the original does before a
/// real provider (SendGrid, SES) is wired in.
#[derive(Default)]
pub struct EmailChannel;

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, _subscription: &AlertSubscription, _event: &AlertEvent, message: &str) -> bool {
        info!(target: "alerts", "email notification would be sent: {}", truncate(message, 100));
        true
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn channel_for(kind: ChannelKind) -> Box<dyn NotificationChannel> {
    match kind {
        ChannelKind::Webhook => Box::new(WebhookChannel::new()),
        ChannelKind::McpQueue => Box::new(McpQueueChannel::new()),
        ChannelKind::Email => Box::new(EmailChannel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use chrono::Utc;
    use serde_json::json;

    fn subscription() -> AlertSubscription {
        AlertSubscription {
            id: "sub-1".to_string(),
            user_id: "user-1".to_string(),
            alert_type: crate::models::AlertType::PriceDrop,
            product_external_id: Some("B000TEST01".to_string()),
            brand_slug: None,
            category: None,
            platform: Platform::AmazonUs,
            threshold_value: None,
            threshold_percent: None,
            channel: ChannelKind::McpQueue,
            webhook_url: None,
            is_active: true,
        }
    }

    fn event() -> AlertEvent {
        AlertEvent {
            id: "evt-1".to_string(),
            subscription_id: "sub-1".to_string(),
            event_type: "price_below_threshold".to_string(),
            event_data: json!({ "current_price": 19.99 }),
            previous_value: None,
            current_value: Some("$19.99".to_string()),
            triggered_at: Utc::now(),
            acknowledged: false,
        }
    }

    #[tokio::test]
    async fn mcp_channel_queues_and_clears() {
        let channel = McpQueueChannel::new();
        let sub = subscription();
        let evt = event();
        assert!(channel.send(&sub, &evt, "test").await);
        assert_eq!(channel.pending_count("user-1"), 1);
        assert_eq!(channel.clear("user-1"), 1);
        assert_eq!(channel.pending_count("user-1"), 0);
    }

    #[tokio::test]
    async fn webhook_channel_fails_without_url() {
        let channel = WebhookChannel::new();
        let mut sub = subscription();
        sub.webhook_url = None;
        let evt = event();
        assert!(!channel.send(&sub, &evt, "test").await);
    }

    #[tokio::test]
    async fn email_channel_always_reports_success() {
        let channel = EmailChannel;
        let sub = subscription();
        let evt = event();
        assert!(channel.send(&sub, &evt, "test").await);
    }
}
