use chrono::{DateTime, Utc};
use log::warn;
use rand::Rng;

use crate::alerts::channels::{channel_for, NotificationChannel};
use crate::alerts::triggers;
use crate::models::{AlertEvent, AlertSubscription, DailyMetric};

/// # NDOC
/// component: `alerts::engine::AlertEngine`
/// purpose: Evaluates subscriptions against metric pairs and dispatches notifications through
///   the matching channel (§4.7). Holds no storage — callers own persisting the returned events
///   and deciding which subscriptions apply to which product.
pub struct AlertEngine;

impl AlertEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates every subscription relevant to one product against its current/previous metric,
    /// dispatching a notification for each trigger that fires. `triggered_at` is supplied by the
    /// caller so event timestamps stay deterministic and testable.
    pub async fn process_product_metrics(
        &self,
        subscriptions: &[AlertSubscription],
        current: &DailyMetric,
        previous: Option<&DailyMetric>,
        triggered_at: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for subscription in subscriptions.iter().filter(|s| s.is_active) {
            if let Some(event) = self.evaluate_subscription(subscription, current, previous, triggered_at).await {
                events.push(event);
            }
        }

        events
    }

    async fn evaluate_subscription(
        &self,
        subscription: &AlertSubscription,
        current: &DailyMetric,
        previous: Option<&DailyMetric>,
        triggered_at: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        let result = triggers::evaluate(subscription, current, previous);
        if !result.triggered {
            return None;
        }

        let event = AlertEvent {
            id: generate_event_id(),
            subscription_id: subscription.id.clone(),
            event_type: result.event_type,
            event_data: result.event_data,
            previous_value: result.previous_value,
            current_value: result.current_value,
            triggered_at,
            acknowledged: false,
        };

        self.dispatch(subscription, &event, &result.message).await;

        Some(event)
    }

    /// Number of events for `subscription_id` triggered within the last `hours`, so callers can
    /// throttle repeat notifications before calling `process_product_metrics` again (§4.7).
    pub fn get_recent_count(&self, subscription_id: &str, events: &[AlertEvent], now: DateTime<Utc>, hours: i64) -> usize {
        let cutoff = now - chrono::Duration::hours(hours);
        events.iter().filter(|e| e.subscription_id == subscription_id && e.triggered_at >= cutoff).count()
    }

    async fn dispatch(&self, subscription: &AlertSubscription, event: &AlertEvent, message: &str) {
        let channel: Box<dyn NotificationChannel> = channel_for(subscription.channel);
        let success = channel.send(subscription, event, message).await;
        crate::logging::log_alert_dispatch(&subscription.id, subscription.channel.as_str(), success);
        if !success {
            warn!(target: "alerts", "failed to dispatch alert for subscription {}", subscription.id);
        }
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_event_id() -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("evt-{suffix:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, ChannelKind, Platform};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn subscription(alert_type: AlertType, threshold_value: Option<Decimal>) -> AlertSubscription {
        AlertSubscription {
            id: "sub-1".to_string(),
            user_id: "user-1".to_string(),
            alert_type,
            product_external_id: Some("B000TEST01".to_string()),
            brand_slug: None,
            category: None,
            platform: Platform::AmazonUs,
            threshold_value,
            threshold_percent: None,
            channel: ChannelKind::McpQueue,
            webhook_url: None,
            is_active: true,
        }
    }

    fn metric(price: i64, in_stock: bool) -> DailyMetric {
        DailyMetric {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            price: Decimal::new(price, 2),
            original_price: None,
            discount_percent: None,
            rank: None,
            reviews: 100,
            rating: 4.5,
            seller_count: 2,
            in_stock,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[tokio::test]
    async fn price_drop_below_threshold_fires_exactly_once() {
        let engine = AlertEngine::new();
        let subs = vec![subscription(AlertType::PriceDrop, Some(Decimal::new(2000, 2)))];
        let current = metric(1999, true);
        let now = Utc::now();

        let events = engine.process_product_metrics(&subs, &current, None, now).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "price_below_threshold");
    }

    #[test]
    fn get_recent_count_excludes_events_outside_the_window_and_other_subscriptions() {
        let engine = AlertEngine::new();
        let now = Utc::now();
        let events = vec![
            AlertEvent {
                id: "evt-1".to_string(),
                subscription_id: "sub-1".to_string(),
                event_type: "stockout".to_string(),
                event_data: serde_json::json!({}),
                previous_value: None,
                current_value: None,
                triggered_at: now - chrono::Duration::hours(1),
                acknowledged: false,
            },
            AlertEvent {
                id: "evt-2".to_string(),
                subscription_id: "sub-1".to_string(),
                event_type: "stockout".to_string(),
                event_data: serde_json::json!({}),
                previous_value: None,
                current_value: None,
                triggered_at: now - chrono::Duration::hours(30),
                acknowledged: false,
            },
            AlertEvent {
                id: "evt-3".to_string(),
                subscription_id: "sub-2".to_string(),
                event_type: "stockout".to_string(),
                event_data: serde_json::json!({}),
                previous_value: None,
                current_value: None,
                triggered_at: now - chrono::Duration::hours(1),
                acknowledged: false,
            },
        ];

        assert_eq!(engine.get_recent_count("sub-1", &events, now, 24), 1);
    }

    #[tokio::test]
    async fn inactive_subscription_is_skipped() {
        let engine = AlertEngine::new();
        let mut sub = subscription(AlertType::PriceDrop, Some(Decimal::new(2000, 2)));
        sub.is_active = false;
        let current = metric(1999, true);
        let now = Utc::now();

        let events = engine.process_product_metrics(&[sub], &current, None, now).await;
        assert!(events.is_empty());
    }
}
