use rust_decimal::prelude::ToPrimitive;

use crate::models::DailyMetric;

const MIN_DATA_POINTS: usize = 14;

const WEIGHT_REVIEW_GROWTH: f64 = 0.5;
const WEIGHT_RANK_ACCEL: f64 = 0.3;
const WEIGHT_PRICE_GROWTH: f64 = 0.2;

const REVIEW_GROWTH_CAP: f64 = 2.0;
const RANK_ACCEL_CAP: f64 = 1.0;
const PRICE_GROWTH_CAP: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSignals {
    pub review_velocity_growth: f64,
    pub rank_acceleration: f64,
    pub price_growth: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendResult {
    pub score: f64,
    pub trend_direction: String,
    pub signals: TrendSignals,
    pub interpretation: String,
}

/// # NDOC
/// component: `signals::trend`
/// purpose: Chronological first-half/second-half comparison of review velocity, rank movement,
///   and price, combined into a signed momentum score (§4.3.4). Also the orchestrator's bare
///   `trend_score` entry point for cross-product ranking.
pub fn calculate(metrics: &[DailyMetric]) -> TrendResult {
    if metrics.len() < MIN_DATA_POINTS {
        return TrendResult {
            score: 0.0,
            trend_direction: "Unknown".to_string(),
            signals: TrendSignals { review_velocity_growth: 0.0, rank_acceleration: 0.0, price_growth: 0.0 },
            interpretation: "Insufficient data (need 14+ days)".to_string(),
        };
    }

    let mut sorted: Vec<&DailyMetric> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.date);

    let mid = sorted.len() / 2;
    let (first_half, second_half) = sorted.split_at(mid);

    let signals = TrendSignals {
        review_velocity_growth: review_velocity_growth(first_half, second_half),
        rank_acceleration: rank_acceleration(first_half, second_half),
        price_growth: price_growth(&sorted),
    };

    let norm_review = normalize(signals.review_velocity_growth, REVIEW_GROWTH_CAP);
    let norm_rank = normalize(signals.rank_acceleration, RANK_ACCEL_CAP);
    let norm_price = normalize(signals.price_growth, PRICE_GROWTH_CAP);

    let score = (norm_review * WEIGHT_REVIEW_GROWTH + norm_rank * WEIGHT_RANK_ACCEL + norm_price * WEIGHT_PRICE_GROWTH) * 100.0;

    let trend_direction = direction(score).to_string();
    let interpretation = interpret(score, &signals);

    TrendResult { score: (score * 10.0).round() / 10.0, trend_direction, signals, interpretation }
}

fn normalize(value: f64, cap: f64) -> f64 {
    (value / cap).clamp(-1.0, 1.0)
}

fn velocity(metrics: &[&DailyMetric]) -> f64 {
    if metrics.len() < 2 {
        return 0.0;
    }
    let oldest = metrics.first().unwrap();
    let newest = metrics.last().unwrap();
    let days = (newest.date - oldest.date).num_days();
    if days == 0 {
        return 0.0;
    }
    (newest.reviews as f64 - oldest.reviews as f64) / days as f64
}

fn review_velocity_growth(first_half: &[&DailyMetric], second_half: &[&DailyMetric]) -> f64 {
    let v1 = velocity(first_half);
    let v2 = velocity(second_half);
    if v1 == 0.0 {
        return if v2 > 0.0 { 1.0 } else { 0.0 };
    }
    (v2 - v1) / v1.abs()
}

fn rank_improvement_rate(metrics: &[&DailyMetric]) -> f64 {
    if metrics.len() < 2 {
        return 0.0;
    }
    let ranks: Vec<u32> = metrics.iter().filter_map(|m| m.rank).collect();
    if ranks.len() < 2 {
        return 0.0;
    }
    let days = (metrics.last().unwrap().date - metrics.first().unwrap().date).num_days();
    if days == 0 || ranks[0] == 0 {
        return 0.0;
    }
    (ranks[0] as f64 - *ranks.last().unwrap() as f64) / (ranks[0] as f64 * days as f64)
}

fn rank_acceleration(first_half: &[&DailyMetric], second_half: &[&DailyMetric]) -> f64 {
    let r1 = rank_improvement_rate(first_half);
    let r2 = rank_improvement_rate(second_half);
    if r1 == 0.0 {
        return r2;
    }
    (r2 - r1) / r1.abs()
}

fn price_growth(metrics: &[&DailyMetric]) -> f64 {
    let oldest = metrics.first().unwrap();
    let newest = metrics.last().unwrap();
    let oldest_price = oldest.price.to_f64().unwrap_or(0.0);
    if oldest_price == 0.0 {
        return 0.0;
    }
    let newest_price = newest.price.to_f64().unwrap_or(0.0);
    (newest_price - oldest_price) / oldest_price
}

fn direction(score: f64) -> &'static str {
    if score > 20.0 {
        "Accelerating"
    } else if score < -20.0 {
        "Declining"
    } else {
        "Stable"
    }
}

fn interpret(score: f64, signals: &TrendSignals) -> String {
    let desc = if score > 50.0 {
        "Strong upward momentum"
    } else if score > 20.0 {
        "Positive trend detected"
    } else if score > -20.0 {
        "Relatively stable performance"
    } else if score > -50.0 {
        "Showing signs of decline"
    } else {
        "Significant downward trend"
    };

    let mut details = Vec::new();
    if signals.review_velocity_growth > 0.2 {
        details.push(format!("+{:.0}% review velocity", signals.review_velocity_growth * 100.0));
    } else if signals.review_velocity_growth < -0.2 {
        details.push(format!("{:.0}% review velocity", signals.review_velocity_growth * 100.0));
    }
    if signals.price_growth > 0.05 {
        details.push(format!("+{:.1}% price", signals.price_growth * 100.0));
    } else if signals.price_growth < -0.05 {
        details.push(format!("{:.1}% price", signals.price_growth * 100.0));
    }

    if details.is_empty() {
        format!("{desc}.")
    } else {
        format!("{desc} ({}).", details.join(", "))
    }
}
