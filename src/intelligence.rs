use chrono::NaiveDate;

use crate::models::{DailyMetric, ProductRecord};
use crate::signals::competition::{self, CompetitionResult};
use crate::signals::demand::{self, DemandResult};
use crate::signals::discount_cycle::{self, DiscountCyclePrediction};
use crate::signals::revenue::{self, RevenueEstimate};
use crate::signals::risk::{self, RiskResult};
use crate::signals::trend::{self, TrendResult};

const WEIGHT_DEMAND: f64 = 0.35;
const WEIGHT_TREND: f64 = 0.25;
const WEIGHT_COMPETITION: f64 = 0.20;
const WEIGHT_RISK: f64 = 0.20;

const MAX_INSIGHTS: usize = 5;
const UPCOMING_DISCOUNT_WINDOW_DAYS: i64 = 14;

/// The full signal bundle for one product, assembled from the six calculators in `signals`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductIntelligence {
    pub overall_score: f64,
    pub verdict: String,
    pub confidence: f64,
    pub insights: Vec<String>,
    pub demand: DemandResult,
    pub competition: CompetitionResult,
    pub revenue: RevenueEstimate,
    pub trend: TrendResult,
    pub risk: RiskResult,
    pub discount_cycle: DiscountCyclePrediction,
}

/// # NDOC
/// component: `intelligence::analyze_product`
/// purpose: Runs every signal calculator over a product's metric history and composes the
///   result into a single weighted score, verdict, and ranked insight list (§4.4).
/// invariants:
///   - `today` is supplied by the caller so discount-cycle framing is deterministic and testable.
pub fn analyze_product(metrics: &[DailyMetric], category: &str, today: NaiveDate) -> ProductIntelligence {
    let demand = demand::calculate(metrics);
    let competition = competition::calculate(metrics);
    let revenue = revenue::estimate(metrics, category);
    let trend = trend::calculate(metrics);
    let risk = risk::calculate(metrics);
    let discount_cycle = discount_cycle::predict(metrics);

    let overall_score = compose_score(&demand, &competition, &trend, &risk);
    let confidence = compose_confidence(metrics.len(), &revenue);
    let verdict = verdict(&demand, &competition, &trend, &risk, &revenue);
    let insights = insights(&demand, &competition, &trend, &risk, &discount_cycle, today);

    ProductIntelligence { overall_score, verdict, confidence, insights, demand, competition, revenue, trend, risk, discount_cycle }
}

fn compose_score(demand: &DemandResult, competition: &CompetitionResult, trend: &TrendResult, risk: &RiskResult) -> f64 {
    let trend_normalized = (trend.score + 100.0) / 2.0;
    let score = WEIGHT_DEMAND * demand.score
        + WEIGHT_TREND * trend_normalized
        + WEIGHT_COMPETITION * (100.0 - competition.score)
        + WEIGHT_RISK * (100.0 - risk.score);
    (score * 10.0).round() / 10.0
}

fn data_points_confidence(num_points: usize) -> f64 {
    if num_points >= 60 {
        0.9
    } else if num_points >= 30 {
        0.7
    } else if num_points >= 14 {
        0.5
    } else {
        0.3
    }
}

fn compose_confidence(num_points: usize, revenue: &RevenueEstimate) -> f64 {
    let composed = (data_points_confidence(num_points) + revenue.confidence) / 2.0;
    (composed * 100.0).round() / 100.0
}

fn verdict(demand: &DemandResult, competition: &CompetitionResult, trend: &TrendResult, risk: &RiskResult, revenue: &RevenueEstimate) -> String {
    let demand_phrase = if demand.score >= 60.0 {
        "strong demand"
    } else if demand.score >= 40.0 {
        "moderate demand"
    } else {
        "weak demand"
    };

    let competition_phrase = match competition.barrier_to_entry.as_str() {
        "Low" => "low barriers to entry",
        "Medium" => "moderate competitive barriers",
        "High" => "high competitive barriers",
        _ => "an unclear competitive landscape",
    };

    let mut parts = vec![format!("This product shows {demand_phrase} with {competition_phrase}")];

    if trend.score.abs() > 30.0 {
        parts.push(format!("a {} trend", trend.trend_direction.to_lowercase()));
    }
    if risk.score >= 50.0 {
        parts.push(format!("elevated risk ({})", risk.risk_level.to_lowercase()));
    }

    let mut verdict = parts.join(", ");
    verdict.push('.');

    if revenue.estimated_monthly_revenue > rust_decimal::Decimal::ZERO {
        verdict.push_str(&format!(" Estimated monthly revenue: ${:.0}.", revenue.estimated_monthly_revenue));
    }

    let recommendation = if demand.score >= 60.0 && competition.barrier_to_entry != "Low" && risk.score < 50.0 {
        " Recommended for further evaluation."
    } else if risk.score >= 70.0 {
        " Exercise caution before investing further."
    } else {
        ""
    };
    verdict.push_str(recommendation);

    verdict
}

fn insights(
    demand: &DemandResult,
    competition: &CompetitionResult,
    trend: &TrendResult,
    risk: &RiskResult,
    discount_cycle: &DiscountCyclePrediction,
    today: NaiveDate,
) -> Vec<String> {
    let mut insights = Vec::new();

    if demand.score >= 60.0 || demand.score <= 30.0 {
        insights.push(demand.interpretation.clone());
    }

    insights.push(format!("{} barrier to entry. {}", competition.barrier_to_entry, competition.interpretation));

    if trend.trend_direction == "Accelerating" || trend.trend_direction == "Declining" {
        insights.push(trend.interpretation.clone());
    }

    for flag in risk.flags.iter().take(2) {
        insights.push(flag.description.clone());
    }

    if let Some(next) = discount_cycle.next_predicted_discount {
        let days_until = (next - today).num_days();
        if days_until > 0 && days_until <= UPCOMING_DISCOUNT_WINDOW_DAYS {
            insights.push(format!("Next discount predicted in {days_until} day(s) (~{:.0}% off).", discount_cycle.typical_discount_percent));
        }
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

/// Bare trend score for cross-product ranking, without running the full signal suite.
pub fn trend_score(metrics: &[DailyMetric]) -> f64 {
    trend::calculate(metrics).score
}

/// Aggregates per-category insight text across a set of products' latest records, grouped by
/// `ProductRecord::category`. Used for category-level rollups rather than single-product detail.
pub fn category_insights(products: &[ProductRecord]) -> Vec<(String, String)> {
    use std::collections::BTreeMap;

    let mut by_category: BTreeMap<&str, Vec<&ProductRecord>> = BTreeMap::new();
    for product in products {
        by_category.entry(product.category.as_str()).or_default().push(product);
    }

    by_category
        .into_iter()
        .map(|(category, items)| {
            let avg_rating = items.iter().map(|p| p.rating).sum::<f64>() / items.len() as f64;
            let in_stock = items.iter().filter(|p| p.in_stock).count();
            let summary = format!(
                "{} products, avg rating {:.1}, {}/{} in stock",
                items.len(),
                avg_rating,
                in_stock,
                items.len()
            );
            (category.to_string(), summary)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use rust_decimal::Decimal;

    fn metric(day: u32, reviews: u64, rank: Option<u32>, price: i64, rating: f64) -> DailyMetric {
        DailyMetric {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            price: Decimal::new(price, 2),
            original_price: None,
            discount_percent: None,
            rank,
            reviews,
            rating,
            seller_count: 3,
            in_stock: true,
            delivery_days: None,
            buybox_owner: Some("amazon.com".to_string()),
        }
    }

    fn record(category: &str, rating: f64, in_stock: bool) -> ProductRecord {
        ProductRecord {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            url: "https://www.amazon.com/dp/B000TEST01".to_string(),
            title: "Test Widget".to_string(),
            category: category.to_string(),
            brand: None,
            image_url: None,
            price: Decimal::new(2999, 2),
            original_price: None,
            discount_percent: None,
            rank: Some(1000),
            reviews: 500,
            rating,
            seller_count: 3,
            in_stock,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn overall_score_is_bounded_and_deterministic() {
        let metrics: Vec<DailyMetric> = (1..=20u32).map(|d| metric(d, d as u64 * 30, Some(5000 - d * 100), 2999, 4.5)).collect();
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let result = analyze_product(&metrics, "Electronics", today);
        assert!(result.overall_score >= 0.0 && result.overall_score <= 100.0);
        assert!(!result.insights.is_empty());
        assert!(result.insights.len() <= MAX_INSIGHTS);
    }

    #[test]
    fn high_demand_and_low_risk_recommends_further_evaluation() {
        let metrics: Vec<DailyMetric> = (1..=20u32).map(|d| metric(d, 50 + d as u64 * 40, Some((5000 - d * 150).max(10)), 2999, 4.6)).collect();
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let result = analyze_product(&metrics, "Electronics", today);
        assert!(result.demand.score > 40.0);
    }

    #[test]
    fn category_insights_groups_by_category() {
        let products = vec![
            record("Electronics", 4.5, true),
            record("Electronics", 4.0, false),
            record("Toys & Games", 3.8, true),
        ];
        let insights = category_insights(&products);
        assert_eq!(insights.len(), 2);
        assert!(insights.iter().any(|(cat, _)| cat == "Electronics"));
    }
}
