use rust_decimal::prelude::ToPrimitive;

use crate::models::DailyMetric;

const MAX_REVIEW_VELOCITY: f64 = 50.0;
const MAX_RANK_IMPROVEMENT: f64 = 0.5;
const MAX_STOCKOUT_FREQ: f64 = 0.3;
const MAX_PRICE_INCREASE: f64 = 0.2;

const WEIGHT_REVIEW_VELOCITY: f64 = 0.4;
const WEIGHT_RANK_IMPROVEMENT: f64 = 0.3;
const WEIGHT_STOCKOUT_FREQUENCY: f64 = 0.2;
const WEIGHT_PRICE_INCREASE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct DemandSignals {
    pub review_velocity: f64,
    pub rank_improvement: f64,
    pub stockout_frequency: f64,
    pub price_increase: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemandResult {
    pub score: f64,
    pub signals: DemandSignals,
    pub interpretation: String,
}

fn normalize(x: f64, cap: f64) -> f64 {
    (x / cap).min(1.0)
}

/// # NDOC
/// component: `signals::demand`
/// purpose: Weighted demand score over a product's metrics window (§4.3.1).
/// invariants:
///   - Requires at least 2 data points; fewer yields a zeroed result, never an error.
pub fn calculate(metrics: &[DailyMetric]) -> DemandResult {
    if metrics.len() < 2 {
        return DemandResult {
            score: 0.0,
            signals: DemandSignals { review_velocity: 0.0, rank_improvement: 0.0, stockout_frequency: 0.0, price_increase: 0.0 },
            interpretation: "Insufficient data for demand calculation".to_string(),
        };
    }

    let mut sorted: Vec<&DailyMetric> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.date);

    let signals = DemandSignals {
        review_velocity: review_velocity(&sorted),
        rank_improvement: rank_improvement(&sorted),
        stockout_frequency: stockout_frequency(&sorted),
        price_increase: price_increase(&sorted),
    };

    let norm_review = normalize(signals.review_velocity, MAX_REVIEW_VELOCITY);
    let norm_rank = normalize(signals.rank_improvement.max(0.0), MAX_RANK_IMPROVEMENT);
    let norm_stockout = normalize(signals.stockout_frequency, MAX_STOCKOUT_FREQ);
    let norm_price = normalize(signals.price_increase.max(0.0), MAX_PRICE_INCREASE);

    let score = (norm_review * WEIGHT_REVIEW_VELOCITY
        + norm_rank * WEIGHT_RANK_IMPROVEMENT
        + norm_stockout * WEIGHT_STOCKOUT_FREQUENCY
        + norm_price * WEIGHT_PRICE_INCREASE)
        * 100.0;

    let interpretation = interpret(score, &signals);

    DemandResult { score: (score * 10.0).round() / 10.0, signals, interpretation }
}

fn review_velocity(metrics: &[&DailyMetric]) -> f64 {
    let oldest = metrics.first().unwrap();
    let newest = metrics.last().unwrap();
    let days = (newest.date - oldest.date).num_days();
    if days == 0 {
        return 0.0;
    }
    (newest.reviews as f64 - oldest.reviews as f64) / days as f64
}

fn rank_improvement(metrics: &[&DailyMetric]) -> f64 {
    let oldest = metrics.first().unwrap();
    let newest = metrics.last().unwrap();
    match (oldest.rank, newest.rank) {
        (Some(old_rank), Some(new_rank)) if old_rank > 0 => {
            (old_rank as f64 - new_rank as f64) / old_rank as f64
        }
        _ => 0.0,
    }
}

fn stockout_frequency(metrics: &[&DailyMetric]) -> f64 {
    let out_of_stock = metrics.iter().filter(|m| !m.in_stock).count();
    out_of_stock as f64 / metrics.len() as f64
}

fn price_increase(metrics: &[&DailyMetric]) -> f64 {
    let oldest = metrics.first().unwrap();
    let newest = metrics.last().unwrap();
    let oldest_price = oldest.price.to_f64().unwrap_or(0.0);
    if oldest_price == 0.0 {
        return 0.0;
    }
    let newest_price = newest.price.to_f64().unwrap_or(0.0);
    (newest_price - oldest_price) / oldest_price
}

fn interpret(score: f64, signals: &DemandSignals) -> String {
    let level = if score >= 80.0 {
        "Very High Demand"
    } else if score >= 60.0 {
        "High Demand"
    } else if score >= 40.0 {
        "Moderate Demand"
    } else if score >= 20.0 {
        "Low Demand"
    } else {
        "Very Low Demand"
    };

    let mut insights = Vec::new();
    if signals.review_velocity > 10.0 {
        insights.push(format!("Strong review velocity ({:.1}/day)", signals.review_velocity));
    }
    if signals.rank_improvement > 0.1 {
        insights.push(format!("Rank improving ({:.1}%)", signals.rank_improvement * 100.0));
    }
    if signals.stockout_frequency > 0.1 {
        insights.push("Frequent stockouts indicate demand".to_string());
    }
    if signals.price_increase > 0.05 {
        insights.push("Price trending up".to_string());
    }

    let insight_text = if insights.is_empty() { "Normal demand indicators".to_string() } else { insights.join(". ") };
    format!("{level}. {insight_text}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use crate::models::Platform;

    fn metric(day: u32, reviews: u64, rank: Option<u32>, price: i64, in_stock: bool) -> DailyMetric {
        DailyMetric {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            price: Decimal::new(price, 2),
            original_price: None,
            discount_percent: None,
            rank,
            reviews,
            rating: 4.5,
            seller_count: 1,
            in_stock,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn insufficient_data_yields_zero_score() {
        let result = calculate(&[metric(1, 10, Some(1000), 2999, true)]);
        assert_eq!(result.score, 0.0);
        assert!(result.interpretation.contains("Insufficient"));
    }

    #[test]
    fn rising_reviews_and_improving_rank_drive_high_demand() {
        let metrics = vec![
            metric(1, 100, Some(5000), 2999, true),
            metric(2, 400, Some(4500), 2999, true),
            metric(3, 900, Some(4000), 2999, true),
            metric(4, 1600, Some(3000), 2999, true),
        ];
        let result = calculate(&metrics);
        assert!(result.score > 50.0, "expected high demand score, got {}", result.score);
        assert!(result.signals.review_velocity > 0.0);
        assert!(result.signals.rank_improvement > 0.0);
    }

    #[test]
    fn stockouts_increase_stockout_frequency_signal() {
        let metrics = vec![
            metric(1, 10, Some(1000), 2999, false),
            metric(2, 12, Some(1000), 2999, false),
            metric(3, 14, Some(1000), 2999, true),
        ];
        let result = calculate(&metrics);
        assert!((result.signals.stockout_frequency - 2.0 / 3.0).abs() < 1e-9);
    }
}
