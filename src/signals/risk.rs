use crate::models::DailyMetric;

const MIN_DATA_POINTS: usize = 7;
const REVIEW_SPIKE_THRESHOLD: f64 = 3.0;
const HIGH_CHURN_THRESHOLD: f64 = 0.3;
const HIGH_VOLATILITY_THRESHOLD: f64 = 0.5;

const WEIGHT_REVIEW_SPIKE: f64 = 0.4;
const WEIGHT_SELLER_CHURN: f64 = 0.3;
const WEIGHT_RATING_VOLATILITY: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskSignals {
    pub review_spike_detected: bool,
    pub review_spike_magnitude: f64,
    pub seller_churn_rate: f64,
    pub rating_volatility: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskFlag {
    pub category: String,
    pub severity: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskResult {
    pub score: f64,
    pub risk_level: String,
    pub signals: RiskSignals,
    pub flags: Vec<RiskFlag>,
    pub interpretation: String,
}

/// # NDOC
/// component: `signals::risk`
/// purpose: Review-spike, seller-churn, and rating-volatility blend (§4.3.5). The flag list is
///   surfaced independently of the score — a flag can exist below a "High" score threshold.
pub fn calculate(metrics: &[DailyMetric]) -> RiskResult {
    if metrics.len() < MIN_DATA_POINTS {
        return RiskResult {
            score: 0.0,
            risk_level: "Unknown".to_string(),
            signals: RiskSignals { review_spike_detected: false, review_spike_magnitude: 0.0, seller_churn_rate: 0.0, rating_volatility: 0.0 },
            flags: Vec::new(),
            interpretation: "Insufficient data for risk analysis".to_string(),
        };
    }

    let mut sorted: Vec<&DailyMetric> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.date);

    let (spike_detected, spike_magnitude) = detect_review_spikes(&sorted);
    let seller_churn = seller_churn(&sorted);
    let rating_volatility = rating_volatility(&sorted);

    let signals = RiskSignals {
        review_spike_detected: spike_detected,
        review_spike_magnitude: spike_magnitude,
        seller_churn_rate: seller_churn,
        rating_volatility,
    };

    let norm_spike = (spike_magnitude / 5.0).min(1.0);
    let norm_churn = (seller_churn / 0.5).min(1.0);
    let norm_volatility = rating_volatility.min(1.0);

    let score = (norm_spike * WEIGHT_REVIEW_SPIKE + norm_churn * WEIGHT_SELLER_CHURN + norm_volatility * WEIGHT_RATING_VOLATILITY) * 100.0;

    let flags = generate_flags(&signals);
    let risk_level = risk_level(score).to_string();
    let interpretation = format!("{risk_level} risk ({} flag(s)).", flags.len());

    RiskResult { score: (score * 10.0).round() / 10.0, risk_level, signals, flags, interpretation }
}

fn detect_review_spikes(metrics: &[&DailyMetric]) -> (bool, f64) {
    let daily_changes: Vec<f64> = metrics
        .windows(2)
        .map(|w| (w[1].reviews as f64 - w[0].reviews as f64).max(0.0))
        .collect();
    if daily_changes.is_empty() {
        return (false, 0.0);
    }
    let max_change = daily_changes.iter().cloned().fold(0.0, f64::max);
    if max_change == 0.0 {
        return (false, 0.0);
    }
    let avg_change = daily_changes.iter().sum::<f64>() / daily_changes.len() as f64;
    if avg_change == 0.0 {
        return (false, 0.0);
    }
    let magnitude = max_change / avg_change;
    (magnitude > REVIEW_SPIKE_THRESHOLD, magnitude)
}

fn seller_churn(metrics: &[&DailyMetric]) -> f64 {
    if metrics.len() < 2 {
        return 0.0;
    }
    let changes = metrics.windows(2).filter(|w| w[0].seller_count != w[1].seller_count).count();
    changes as f64 / (metrics.len() - 1) as f64
}

fn rating_volatility(metrics: &[&DailyMetric]) -> f64 {
    let ratings: Vec<f64> = metrics.iter().map(|m| m.rating).filter(|&r| r > 0.0).collect();
    if ratings.len() < 2 {
        return 0.0;
    }
    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    let variance = ratings.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (ratings.len() - 1) as f64;
    variance.sqrt()
}

fn generate_flags(signals: &RiskSignals) -> Vec<RiskFlag> {
    let mut flags = Vec::new();

    if signals.review_spike_detected {
        let severity = if signals.review_spike_magnitude > 5.0 {
            "high"
        } else if signals.review_spike_magnitude > 3.0 {
            "medium"
        } else {
            "low"
        };
        flags.push(RiskFlag {
            category: "review_manipulation".to_string(),
            severity: severity.to_string(),
            description: format!("Unusual review spike detected ({:.1}x normal rate)", signals.review_spike_magnitude),
        });
    }

    if signals.seller_churn_rate > HIGH_CHURN_THRESHOLD {
        flags.push(RiskFlag {
            category: "seller_instability".to_string(),
            severity: "medium".to_string(),
            description: format!("High seller turnover ({:.0}% churn rate)", signals.seller_churn_rate * 100.0),
        });
    }

    if signals.rating_volatility > HIGH_VOLATILITY_THRESHOLD {
        flags.push(RiskFlag {
            category: "quality_issues".to_string(),
            severity: "medium".to_string(),
            description: format!("Rating volatility detected (sigma = {:.2})", signals.rating_volatility),
        });
    }

    flags
}

fn risk_level(score: f64) -> &'static str {
    if score >= 70.0 {
        "Critical"
    } else if score >= 50.0 {
        "High"
    } else if score >= 25.0 {
        "Medium"
    } else {
        "Low"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use crate::models::Platform;

    fn metric(day: u32, reviews: u64, seller_count: u32, rating: f64) -> DailyMetric {
        DailyMetric {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            price: Decimal::new(2999, 2),
            original_price: None,
            discount_percent: None,
            rank: Some(1000),
            reviews,
            rating,
            seller_count,
            in_stock: true,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn fewer_than_seven_points_is_unknown_risk() {
        let metrics: Vec<DailyMetric> = (1..=5).map(|d| metric(d, d as u64, 1, 4.5)).collect();
        let result = calculate(&metrics);
        assert_eq!(result.risk_level, "Unknown");
    }

    #[test]
    fn review_burst_flags_review_manipulation() {
        let metrics = vec![
            metric(1, 10, 1, 4.5),
            metric(2, 12, 1, 4.5),
            metric(3, 14, 1, 4.5),
            metric(4, 16, 1, 4.5),
            metric(5, 18, 1, 4.5),
            metric(6, 20, 1, 4.5),
            metric(7, 500, 1, 4.5),
        ];
        let result = calculate(&metrics);
        assert!(result.signals.review_spike_detected);
        assert!(result.flags.iter().any(|f| f.category == "review_manipulation"));
    }

    #[test]
    fn volatile_ratings_flag_quality_issues() {
        let ratings = [5.0, 2.0, 4.8, 1.5, 4.9, 2.1, 4.7];
        let metrics: Vec<DailyMetric> = ratings.iter().enumerate().map(|(i, &r)| metric(i as u32 + 1, 10, 1, r)).collect();
        let result = calculate(&metrics);
        assert!(result.signals.rating_volatility > HIGH_VOLATILITY_THRESHOLD);
        assert!(result.flags.iter().any(|f| f.category == "quality_issues"));
    }
}
