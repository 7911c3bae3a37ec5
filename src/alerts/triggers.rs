use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

use crate::models::{AlertSubscription, AlertType, DailyMetric};

const DEFAULT_RANK_CHANGE_THRESHOLD_PERCENT: f64 = 20.0;
const DEFAULT_ARBITRAGE_THRESHOLD_PERCENT: f64 = 15.0;

/// Fixed bestseller-rank bands a product can cross, best (lowest number) to worst.
const RANK_BANDS: &[u32] = &[100, 500, 1000, 5000, 10000, 50000, 100000];

/// Outcome of evaluating one subscription against a metric pair. `None` fields mirror the
/// Python trigger's `previous_value`/`current_value` display strings (§4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerResult {
    pub triggered: bool,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub previous_value: Option<String>,
    pub current_value: Option<String>,
    pub message: String,
}

impl TriggerResult {
    fn not_triggered() -> Self {
        Self { triggered: false, event_type: String::new(), event_data: json!({}), previous_value: None, current_value: None, message: String::new() }
    }
}

/// # NDOC
/// component: `alerts::triggers::evaluate`
/// purpose: Dispatches on `AlertSubscription::alert_type` to the matching rule (§4.7). Returns
///   a `TriggerResult` with `triggered: false` rather than `None` when nothing fires, so callers
///   never need to special-case "no trigger" against "unknown trigger".
pub fn evaluate(subscription: &AlertSubscription, current: &DailyMetric, previous: Option<&DailyMetric>) -> TriggerResult {
    match subscription.alert_type {
        AlertType::PriceDrop => price_drop(subscription, current, previous),
        AlertType::Stockout => stockout(current, previous),
        AlertType::TrendChange => trend_change(subscription, current, previous),
        AlertType::RankChange => rank_change(subscription, current, previous),
        AlertType::Arbitrage => TriggerResult::not_triggered(),
    }
}

fn price_drop(subscription: &AlertSubscription, current: &DailyMetric, previous: Option<&DailyMetric>) -> TriggerResult {
    let current_price = current.price.to_f64().unwrap_or(0.0);

    if let Some(threshold) = subscription.threshold_value {
        let threshold = threshold.to_f64().unwrap_or(0.0);
        if current_price <= threshold {
            return TriggerResult {
                triggered: true,
                event_type: "price_below_threshold".to_string(),
                event_data: json!({ "current_price": current_price, "threshold": threshold }),
                previous_value: None,
                current_value: Some(format!("${current_price:.2}")),
                message: format!("Price dropped to ${current_price:.2} (below ${threshold:.2} threshold)"),
            };
        }
    }

    if let (Some(previous), Some(threshold_percent)) = (previous, subscription.threshold_percent) {
        let previous_price = previous.price.to_f64().unwrap_or(0.0);
        if previous_price > 0.0 {
            let drop_percent = (previous_price - current_price) / previous_price * 100.0;
            if drop_percent >= threshold_percent {
                return TriggerResult {
                    triggered: true,
                    event_type: "price_drop_percent".to_string(),
                    event_data: json!({ "current_price": current_price, "previous_price": previous_price, "drop_percent": drop_percent }),
                    previous_value: Some(format!("${previous_price:.2}")),
                    current_value: Some(format!("${current_price:.2}")),
                    message: format!("Price dropped {drop_percent:.1}% from ${previous_price:.2} to ${current_price:.2}"),
                };
            }
        }
    }

    TriggerResult::not_triggered()
}

fn stockout(current: &DailyMetric, previous: Option<&DailyMetric>) -> TriggerResult {
    if !current.in_stock && previous.map(|p| p.in_stock).unwrap_or(true) {
        return TriggerResult {
            triggered: true,
            event_type: "stockout".to_string(),
            event_data: json!({ "last_price": current.price.to_f64().unwrap_or(0.0) }),
            previous_value: Some("In Stock".to_string()),
            current_value: Some("Out of Stock".to_string()),
            message: "Product is now OUT OF STOCK".to_string(),
        };
    }

    if current.in_stock {
        if let Some(previous) = previous {
            if !previous.in_stock {
                return TriggerResult {
                    triggered: true,
                    event_type: "back_in_stock".to_string(),
                    event_data: json!({ "current_price": current.price.to_f64().unwrap_or(0.0) }),
                    previous_value: Some("Out of Stock".to_string()),
                    current_value: Some("In Stock".to_string()),
                    message: format!("Product is BACK IN STOCK at ${}", current.price),
                };
            }
        }
    }

    TriggerResult::not_triggered()
}

/// Fires on a significant percentage rank move (default threshold 20%), independent of any
/// fixed band. Distinct event names from `rank_change`'s band-crossing rule.
fn trend_change(subscription: &AlertSubscription, current: &DailyMetric, previous: Option<&DailyMetric>) -> TriggerResult {
    let Some(previous) = previous else { return TriggerResult::not_triggered() };
    let (Some(current_rank), Some(previous_rank)) = (current.rank, previous.rank) else {
        return TriggerResult::not_triggered();
    };
    if previous_rank == 0 {
        return TriggerResult::not_triggered();
    }

    let rank_improvement = previous_rank as f64 - current_rank as f64;
    let change_percent = rank_improvement / previous_rank as f64 * 100.0;
    let threshold_percent = subscription.threshold_percent.unwrap_or(DEFAULT_RANK_CHANGE_THRESHOLD_PERCENT);

    if change_percent.abs() < threshold_percent {
        return TriggerResult::not_triggered();
    }

    let (event_type, direction) = if rank_improvement > 0.0 { ("rank_improving", "improved") } else { ("rank_declining", "declined") };

    TriggerResult {
        triggered: true,
        event_type: event_type.to_string(),
        event_data: json!({ "current_rank": current_rank, "previous_rank": previous_rank, "change_percent": change_percent }),
        previous_value: Some(format!("#{previous_rank}")),
        current_value: Some(format!("#{current_rank}")),
        message: format!("Rank {direction} by {:.1}% (#{previous_rank} -> #{current_rank})", change_percent.abs()),
    }
}

/// Fires when a product's rank crosses any of the fixed `RANK_BANDS`, i.e. moves from one side
/// of a threshold to the other between `previous` and `current` (§4.7).
fn rank_change(_subscription: &AlertSubscription, current: &DailyMetric, previous: Option<&DailyMetric>) -> TriggerResult {
    let Some(previous) = previous else { return TriggerResult::not_triggered() };
    let (Some(current_rank), Some(previous_rank)) = (current.rank, previous.rank) else {
        return TriggerResult::not_triggered();
    };

    let Some(&crossed_band) = RANK_BANDS.iter().find(|&&band| (previous_rank >= band) != (current_rank >= band)) else {
        return TriggerResult::not_triggered();
    };

    let entered = current_rank < crossed_band;
    let event_type = if entered { "entered_top_rank" } else { "exited_top_rank" };
    let verb = if entered { "entered" } else { "exited" };

    TriggerResult {
        triggered: true,
        event_type: event_type.to_string(),
        event_data: json!({ "current_rank": current_rank, "previous_rank": previous_rank, "band": crossed_band }),
        previous_value: Some(format!("#{previous_rank}")),
        current_value: Some(format!("#{current_rank}")),
        message: format!("Product {verb} top-{crossed_band} rank band (#{previous_rank} -> #{current_rank})"),
    }
}

/// Evaluated outside of `evaluate` because it takes an already-USD-normalized margin rather
/// than a metric pair — callers run this per `ArbitrageOpportunity` produced by
/// `arbitrage::analyze_prices` (§4.7).
pub fn arbitrage(subscription: &AlertSubscription, margin_percent: f64) -> TriggerResult {
    let threshold = subscription.threshold_percent.unwrap_or(DEFAULT_ARBITRAGE_THRESHOLD_PERCENT);
    if margin_percent < threshold {
        return TriggerResult::not_triggered();
    }

    TriggerResult {
        triggered: true,
        event_type: "arbitrage_opportunity".to_string(),
        event_data: json!({ "margin_percent": margin_percent, "threshold": threshold }),
        previous_value: None,
        current_value: Some(format!("{margin_percent:.1}%")),
        message: format!("Arbitrage opportunity with {margin_percent:.1}% margin (threshold {threshold:.1}%)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelKind, Platform};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn subscription(alert_type: AlertType, threshold_value: Option<Decimal>, threshold_percent: Option<f64>) -> AlertSubscription {
        AlertSubscription {
            id: "sub-1".to_string(),
            user_id: "user-1".to_string(),
            alert_type,
            product_external_id: Some("B000TEST01".to_string()),
            brand_slug: None,
            category: None,
            platform: Platform::AmazonUs,
            threshold_value,
            threshold_percent,
            channel: ChannelKind::Webhook,
            webhook_url: Some("https://example.com/hook".to_string()),
            is_active: true,
        }
    }

    fn metric(price: i64, in_stock: bool, rank: Option<u32>) -> DailyMetric {
        DailyMetric {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            price: Decimal::new(price, 2),
            original_price: None,
            discount_percent: None,
            rank,
            reviews: 100,
            rating: 4.5,
            seller_count: 2,
            in_stock,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn price_below_absolute_threshold_fires_once() {
        let sub = subscription(AlertType::PriceDrop, Some(Decimal::new(2000, 2)), None);
        let current = metric(1999, true, None);
        let result = evaluate(&sub, &current, None);
        assert!(result.triggered);
        assert_eq!(result.event_type, "price_below_threshold");
    }

    #[test]
    fn price_above_threshold_does_not_fire() {
        let sub = subscription(AlertType::PriceDrop, Some(Decimal::new(1000, 2)), None);
        let current = metric(1999, true, None);
        let result = evaluate(&sub, &current, None);
        assert!(!result.triggered);
    }

    #[test]
    fn transition_to_out_of_stock_fires_stockout() {
        let sub = subscription(AlertType::Stockout, None, None);
        let previous = metric(1999, true, None);
        let current = metric(1999, false, None);
        let result = evaluate(&sub, &current, Some(&previous));
        assert!(result.triggered);
        assert_eq!(result.event_type, "stockout");
    }

    #[test]
    fn already_out_of_stock_does_not_refire() {
        let sub = subscription(AlertType::Stockout, None, None);
        let previous = metric(1999, false, None);
        let current = metric(1999, false, None);
        let result = evaluate(&sub, &current, Some(&previous));
        assert!(!result.triggered);
    }

    #[test]
    fn crossing_a_rank_band_fires_rank_change() {
        let sub = subscription(AlertType::RankChange, None, None);
        let previous = metric(1999, true, Some(1200));
        let current = metric(1999, true, Some(700));
        let result = evaluate(&sub, &current, Some(&previous));
        assert!(result.triggered);
        assert_eq!(result.event_type, "entered_top_rank");
    }

    #[test]
    fn significant_percent_move_fires_trend_change() {
        let sub = subscription(AlertType::TrendChange, None, Some(10.0));
        let previous = metric(1999, true, Some(1000));
        let current = metric(1999, true, Some(700));
        let result = evaluate(&sub, &current, Some(&previous));
        assert!(result.triggered);
        assert_eq!(result.event_type, "rank_improving");
    }

    #[test]
    fn staying_within_the_same_rank_band_does_not_fire_rank_change() {
        let sub = subscription(AlertType::RankChange, None, None);
        let previous = metric(1999, true, Some(450));
        let current = metric(1999, true, Some(420));
        let result = evaluate(&sub, &current, Some(&previous));
        assert!(!result.triggered);
    }

    #[test]
    fn arbitrage_fires_above_default_threshold() {
        let sub = subscription(AlertType::Arbitrage, None, None);
        let result = arbitrage(&sub, 18.0);
        assert!(result.triggered);
        assert_eq!(result.event_type, "arbitrage_opportunity");
    }

    #[test]
    fn arbitrage_does_not_fire_below_threshold() {
        let sub = subscription(AlertType::Arbitrage, None, Some(25.0));
        let result = arbitrage(&sub, 18.0);
        assert!(!result.triggered);
    }
}
