use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::DailyMetric;

/// `(a, b)` in `daily_sales = a * rank^(-b)`, keyed by category. Rank-based, used for Amazon.
const AMAZON_CALIBRATION: &[(&str, f64, f64)] = &[
    ("Electronics", 50000.0, 0.8),
    ("Home & Kitchen", 40000.0, 0.75),
    ("Toys & Games", 30000.0, 0.78),
    ("Clothing", 35000.0, 0.72),
    ("Beauty", 25000.0, 0.76),
    ("Sports & Outdoors", 28000.0, 0.74),
    ("Books", 60000.0, 0.85),
];
const AMAZON_DEFAULT: (f64, f64) = (30000.0, 0.75);

/// `(base, mult)` in `daily_sales = base + review_velocity * mult`, keyed by category.
/// Review-velocity-based, used for platforms without a bestseller rank.
const REVIEW_VELOCITY_CALIBRATION: &[(&str, f64, f64)] = &[
    ("Electronics", 5.0, 2.0),
    ("Fashion", 8.0, 1.5),
    ("Home & Furniture", 3.0, 1.8),
];
const REVIEW_VELOCITY_DEFAULT: (f64, f64) = (4.0, 1.6);

#[derive(Debug, Clone, PartialEq)]
pub struct RevenueEstimate {
    pub estimated_daily_sales: f64,
    pub estimated_monthly_revenue: Decimal,
    pub estimated_monthly_units: u32,
    pub confidence: f64,
    pub methodology: String,
}

fn amazon_calibration(category: &str) -> (f64, f64) {
    AMAZON_CALIBRATION
        .iter()
        .find(|(name, ..)| *name == category)
        .map(|(_, a, b)| (*a, *b))
        .unwrap_or(AMAZON_DEFAULT)
}

fn review_velocity_calibration(category: &str) -> (f64, f64) {
    REVIEW_VELOCITY_CALIBRATION
        .iter()
        .find(|(name, ..)| *name == category)
        .map(|(_, base, mult)| (*base, *mult))
        .unwrap_or(REVIEW_VELOCITY_DEFAULT)
}

/// # NDOC
/// component: `signals::revenue`
/// purpose: Power-law revenue estimator for rank-bearing platforms, with a review-velocity
///   fallback for platforms that expose no bestseller rank (§4.3.3).
pub fn estimate(metrics: &[DailyMetric], category: &str) -> RevenueEstimate {
    let Some(latest) = metrics.iter().max_by_key(|m| m.date) else {
        return empty("No data available");
    };

    match latest.rank {
        Some(rank) if rank > 0 => estimate_from_rank(metrics, latest, rank, category),
        _ => estimate_from_reviews(metrics, category),
    }
}

fn estimate_from_rank(metrics: &[DailyMetric], latest: &DailyMetric, rank: u32, category: &str) -> RevenueEstimate {
    let (a, b) = amazon_calibration(category);
    let daily_sales = daily_sales_power_law(rank, a, b);
    let price = latest.price.to_f64().unwrap_or(0.0);
    let monthly_units = (daily_sales * 30.0) as u32;
    let monthly_revenue = Decimal::try_from(daily_sales * 30.0 * price).unwrap_or(Decimal::ZERO);

    let confidence = rank_based_confidence(metrics, latest, rank);
    let methodology = format!("Power law model (a={a}, b={b}) for {category} category. Based on BSR #{rank}.");

    RevenueEstimate {
        estimated_daily_sales: round2(daily_sales),
        estimated_monthly_revenue: monthly_revenue.round_dp(2),
        estimated_monthly_units: monthly_units,
        confidence,
        methodology,
    }
}

fn daily_sales_power_law(rank: u32, a: f64, b: f64) -> f64 {
    let raw = a * (rank as f64).powf(-b);
    raw.clamp(0.1, 10000.0)
}

fn rank_based_confidence(metrics: &[DailyMetric], latest: &DailyMetric, rank: u32) -> f64 {
    let mut confidence = 0.5;
    if metrics.len() >= 30 {
        confidence += 0.2;
    } else if metrics.len() >= 14 {
        confidence += 0.1;
    }

    if metrics.len() >= 7 {
        let ranks: Vec<f64> = metrics.iter().filter_map(|m| m.rank).map(|r| r as f64).collect();
        if !ranks.is_empty() {
            let avg_rank = ranks.iter().sum::<f64>() / ranks.len() as f64;
            if avg_rank > 0.0 {
                let deviation = (rank as f64 - avg_rank).abs() / avg_rank;
                if deviation < 0.1 {
                    confidence += 0.1;
                } else if deviation < 0.25 {
                    confidence += 0.05;
                }
            }
        }
    }

    if latest.reviews > 1000 {
        confidence += 0.1;
    } else if latest.reviews > 100 {
        confidence += 0.05;
    }

    confidence.min(0.95)
}

fn estimate_from_reviews(metrics: &[DailyMetric], category: &str) -> RevenueEstimate {
    if metrics.len() < 7 {
        return RevenueEstimate {
            estimated_daily_sales: 0.0,
            estimated_monthly_revenue: Decimal::ZERO,
            estimated_monthly_units: 0,
            confidence: 0.2,
            methodology: "Insufficient data (need 7+ days for review-velocity estimation)".to_string(),
        };
    }

    let mut sorted: Vec<&DailyMetric> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.date);
    let first = sorted.first().unwrap();
    let last = sorted.last().unwrap();

    let days = (last.date - first.date).num_days().max(1);
    let review_velocity = (last.reviews as f64 - first.reviews as f64) / days as f64;

    let (base_sales, multiplier) = review_velocity_calibration(category);
    let daily_sales = (base_sales + review_velocity * multiplier).clamp(0.5, 5000.0);

    let price = last.price.to_f64().unwrap_or(0.0);
    let monthly_units = (daily_sales * 30.0) as u32;
    let monthly_revenue = Decimal::try_from(daily_sales * 30.0 * price).unwrap_or(Decimal::ZERO);

    let mut confidence = 0.4;
    if sorted.len() >= 30 {
        confidence += 0.15;
    } else if sorted.len() >= 14 {
        confidence += 0.1;
    }
    if last.reviews > 1000 {
        confidence += 0.1;
    } else if last.reviews > 100 {
        confidence += 0.05;
    }
    confidence = confidence.min(0.75);

    let methodology = format!(
        "Review velocity estimate for {category}: {review_velocity:.2} reviews/day -> {daily_sales:.1} sales/day"
    );

    RevenueEstimate {
        estimated_daily_sales: round2(daily_sales),
        estimated_monthly_revenue: monthly_revenue.round_dp(2),
        estimated_monthly_units: monthly_units,
        confidence,
        methodology,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn empty(methodology: &str) -> RevenueEstimate {
    RevenueEstimate {
        estimated_daily_sales: 0.0,
        estimated_monthly_revenue: Decimal::ZERO,
        estimated_monthly_units: 0,
        confidence: 0.0,
        methodology: methodology.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::models::Platform;

    fn metric(day: u32, reviews: u64, rank: Option<u32>, price: i64) -> DailyMetric {
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
            in_stock: true,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn lower_rank_number_yields_more_daily_sales() {
        let top = estimate(&[metric(1, 2000, Some(100), 2999)], "Electronics");
        let bottom = estimate(&[metric(1, 2000, Some(100000), 2999)], "Electronics");
        assert!(top.estimated_daily_sales > bottom.estimated_daily_sales);
    }

    #[test]
    fn no_rank_falls_back_to_review_velocity_estimator() {
        let metrics: Vec<DailyMetric> = (1..=10).map(|d| metric(d, d as u64 * 20, None, 1999)).collect();
        let result = estimate(&metrics, "Fashion");
        assert!(result.confidence <= 0.75);
        assert!(result.methodology.contains("Review velocity"));
    }

    #[test]
    fn unknown_category_uses_default_calibration() {
        let result = estimate(&[metric(1, 500, Some(5000), 1999)], "Pet Supplies");
        assert!(result.methodology.contains("a=30000"));
    }
}
