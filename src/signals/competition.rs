use std::collections::HashMap;

use crate::models::DailyMetric;

const MAX_SELLER_COUNT: f64 = 50.0;

const WEIGHT_SELLER_COUNT: f64 = 0.4;
const WEIGHT_REVIEW_CONCENTRATION: f64 = 0.3;
const WEIGHT_BUYBOX_VOLATILITY: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionSignals {
    pub avg_seller_count: f64,
    /// 0-1, higher = more concentrated (fewer effective competitors for the buybox).
    pub review_concentration: f64,
    pub buybox_volatility: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionResult {
    pub score: f64,
    pub signals: CompetitionSignals,
    pub interpretation: String,
    pub barrier_to_entry: String,
}

/// # NDOC
/// component: `signals::competition`
/// purpose: Seller-count, buybox-concentration, and buybox-volatility blend (§4.3.2). Higher
///   score means more competition (harder to compete for the buybox).
pub fn calculate(metrics: &[DailyMetric]) -> CompetitionResult {
    if metrics.is_empty() {
        return CompetitionResult {
            score: 50.0,
            signals: CompetitionSignals { avg_seller_count: 1.0, review_concentration: 0.5, buybox_volatility: 0.5 },
            interpretation: "Insufficient data for competition analysis".to_string(),
            barrier_to_entry: "Unknown".to_string(),
        };
    }

    let mut sorted: Vec<&DailyMetric> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.date);

    let avg_seller_count = sorted.iter().map(|m| m.seller_count as f64).sum::<f64>() / sorted.len() as f64;
    let review_concentration = review_concentration(&sorted);
    let buybox_volatility = buybox_volatility(&sorted);

    let signals = CompetitionSignals { avg_seller_count, review_concentration, buybox_volatility };

    let norm_sellers = (avg_seller_count / MAX_SELLER_COUNT).min(1.0);
    let norm_concentration_inverted = 1.0 - review_concentration;

    let score = (norm_sellers * WEIGHT_SELLER_COUNT
        + norm_concentration_inverted * WEIGHT_REVIEW_CONCENTRATION
        + buybox_volatility * WEIGHT_BUYBOX_VOLATILITY)
        * 100.0;

    let interpretation = interpret(score, &signals);
    let barrier = barrier_to_entry(score, &signals);

    CompetitionResult { score: (score * 10.0).round() / 10.0, signals, interpretation, barrier_to_entry: barrier.to_string() }
}

fn review_concentration(metrics: &[&DailyMetric]) -> f64 {
    let owners: Vec<&str> = metrics.iter().filter_map(|m| m.buybox_owner.as_deref()).collect();
    if owners.is_empty() {
        return 0.5;
    }
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for owner in &owners {
        *counts.entry(owner).or_insert(0) += 1;
    }
    let total = owners.len() as f64;
    counts.values().map(|&count| (count as f64 / total).powi(2)).sum()
}

fn buybox_volatility(metrics: &[&DailyMetric]) -> f64 {
    if metrics.len() < 2 {
        return 0.5;
    }
    let max_changes = metrics.len() - 1;
    let changes = metrics.windows(2).filter(|w| w[0].buybox_owner != w[1].buybox_owner).count();
    changes as f64 / max_changes as f64
}

fn interpret(score: f64, signals: &CompetitionSignals) -> String {
    let (level, desc) = if score >= 80.0 {
        ("Extremely Competitive", "Many sellers actively competing for this product")
    } else if score >= 60.0 {
        ("Highly Competitive", "Significant seller competition present")
    } else if score >= 40.0 {
        ("Moderately Competitive", "Normal competitive environment")
    } else if score >= 20.0 {
        ("Low Competition", "Limited seller competition")
    } else {
        ("Very Low Competition", "Dominated by few sellers")
    };
    format!("{level}. {desc}. Average of {:.1} sellers.", signals.avg_seller_count)
}

fn barrier_to_entry(score: f64, signals: &CompetitionSignals) -> &'static str {
    if signals.review_concentration > 0.7 {
        "High"
    } else if score > 70.0 {
        "Low"
    } else if score > 40.0 {
        "Medium"
    } else {
        "High"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use crate::models::Platform;

    fn metric(day: u32, seller_count: u32, buybox_owner: Option<&str>) -> DailyMetric {
        DailyMetric {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            price: Decimal::new(2999, 2),
            original_price: None,
            discount_percent: None,
            rank: Some(1000),
            reviews: 500,
            rating: 4.5,
            seller_count,
            in_stock: true,
            delivery_days: None,
            buybox_owner: buybox_owner.map(str::to_string),
        }
    }

    #[test]
    fn empty_metrics_default_to_moderate_unknown_barrier() {
        let result = calculate(&[]);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.barrier_to_entry, "Unknown");
    }

    #[test]
    fn single_stable_owner_is_high_concentration_and_high_barrier() {
        let metrics = vec![
            metric(1, 2, Some("amazon.com")),
            metric(2, 2, Some("amazon.com")),
            metric(3, 2, Some("amazon.com")),
        ];
        let result = calculate(&metrics);
        assert!(result.signals.review_concentration > 0.7);
        assert_eq!(result.barrier_to_entry, "High");
    }

    #[test]
    fn frequent_buybox_changes_raise_volatility_and_score() {
        let metrics = vec![
            metric(1, 20, Some("seller-a")),
            metric(2, 25, Some("seller-b")),
            metric(3, 30, Some("seller-c")),
            metric(4, 35, Some("seller-d")),
        ];
        let result = calculate(&metrics);
        assert_eq!(result.signals.buybox_volatility, 1.0);
        assert!(result.score > 40.0);
    }
}
