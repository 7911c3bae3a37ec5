use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::models::{Brand, BrandMetric, Product};

const RECENT_PRODUCT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricePositioning {
    Premium,
    MidRange,
    Value,
}

impl PricePositioning {
    fn label(&self) -> &'static str {
        match self {
            PricePositioning::Premium => "premium",
            PricePositioning::MidRange => "mid-range",
            PricePositioning::Value => "value",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrandHealth {
    pub score: f64,
    pub verdict: String,
    pub revenue_trend_percent: f64,
    pub product_growth_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrandCompetitivePosition {
    pub price_positioning: String,
    pub avg_price: f64,
    pub avg_rating: f64,
    pub portfolio_size: u32,
}

/// # NDOC
/// component: `brand::assess_health`
/// purpose: Rating, review-volume, portfolio-size, and revenue-growth banding that scores a
///   brand's overall health 0-100 (§4.6). `as_of` anchors the "recent products" window.
pub fn assess_health(brand: &Brand, products: &[Product], metrics: &[BrandMetric], as_of: DateTime<Utc>) -> BrandHealth {
    let mut score: f64 = 50.0;

    let avg_rating = average_rating(metrics);
    if avg_rating >= 4.5 {
        score += 15.0;
    } else if avg_rating >= 4.0 {
        score += 8.0;
    } else if avg_rating > 0.0 && avg_rating < 3.5 {
        score -= 10.0;
    }

    let total_reviews = metrics.iter().map(|m| m.total_reviews).max().unwrap_or(0);
    if total_reviews >= 10_000 {
        score += 10.0;
    } else if total_reviews >= 1_000 {
        score += 5.0;
    }

    let portfolio_size = products.len() as u32;
    if portfolio_size >= 50 {
        score += 10.0;
    } else if portfolio_size <= 5 {
        score -= 5.0;
    }

    let revenue_trend_percent = revenue_trend(metrics);
    if revenue_trend_percent > 20.0 {
        score += 15.0;
    } else if revenue_trend_percent > 0.0 {
        score += 5.0;
    } else if revenue_trend_percent < 0.0 {
        score -= 10.0;
    }

    score = score.clamp(0.0, 100.0);
    let product_growth_count = recent_product_count(products, as_of);
    let verdict = verdict(score, revenue_trend_percent, brand);

    BrandHealth { score: (score * 10.0).round() / 10.0, verdict, revenue_trend_percent: (revenue_trend_percent * 10.0).round() / 10.0, product_growth_count }
}

fn average_rating(metrics: &[BrandMetric]) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    metrics.iter().map(|m| m.avg_rating).sum::<f64>() / metrics.len() as f64
}

fn revenue_trend(metrics: &[BrandMetric]) -> f64 {
    if metrics.len() < 2 {
        return 0.0;
    }
    let mut sorted: Vec<&BrandMetric> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.date);
    let earliest = sorted.first().unwrap().revenue_estimate.to_f64().unwrap_or(0.0);
    let latest = sorted.last().unwrap().revenue_estimate.to_f64().unwrap_or(0.0);
    if earliest == 0.0 {
        return 0.0;
    }
    (latest - earliest) / earliest * 100.0
}

fn recent_product_count(products: &[Product], as_of: DateTime<Utc>) -> u32 {
    let cutoff = as_of - chrono::Duration::days(RECENT_PRODUCT_WINDOW_DAYS);
    products.iter().filter(|p| p.created_at >= cutoff).count() as u32
}

fn verdict(score: f64, revenue_trend_percent: f64, brand: &Brand) -> String {
    let name = &brand.name;
    if score >= 80.0 && revenue_trend_percent > 10.0 {
        format!("{name} is a top-performing brand with strong, growing revenue.")
    } else if score >= 60.0 {
        format!("{name} shows solid overall health across its product portfolio.")
    } else if score >= 40.0 {
        format!("{name} shows mixed signals; some product lines may need attention.")
    } else {
        format!("{name} is underperforming relative to healthy benchmarks.")
    }
}

/// # NDOC
/// component: `brand::competitive_position`
/// purpose: Average price/rating framing with a premium/mid-range/value label, so a brand can
///   be compared against category peers without re-deriving it per caller.
pub fn competitive_position(products: &[Product], metrics: &[BrandMetric]) -> BrandCompetitivePosition {
    let latest = metrics.iter().max_by_key(|m| m.date);
    let avg_price = latest.map(|m| m.avg_price.to_f64().unwrap_or(0.0)).unwrap_or(0.0);
    let avg_rating = latest.map(|m| m.avg_rating).unwrap_or(0.0);

    let positioning = if avg_price > 100.0 {
        PricePositioning::Premium
    } else if avg_price > 30.0 {
        PricePositioning::MidRange
    } else {
        PricePositioning::Value
    };

    BrandCompetitivePosition {
        price_positioning: positioning.label().to_string(),
        avg_price: (avg_price * 100.0).round() / 100.0,
        avg_rating: (avg_rating * 100.0).round() / 100.0,
        portfolio_size: products.len() as u32,
    }
}

/// Ranks a set of brands' most recent health assessments by score, revenue trend, and rating.
/// Returns `(brand_slug, leader_category)` pairs — e.g. `("acme", "highest revenue growth")`.
pub fn compare_brands(assessments: &[(Brand, BrandHealth)]) -> Vec<(String, String)> {
    let mut leaders = Vec::new();

    if let Some((brand, _)) = assessments.iter().max_by(|a, b| a.1.revenue_trend_percent.partial_cmp(&b.1.revenue_trend_percent).unwrap()) {
        leaders.push((brand.slug.clone(), "highest revenue growth".to_string()));
    }
    if let Some((brand, _)) = assessments.iter().max_by(|a, b| a.1.product_growth_count.cmp(&b.1.product_growth_count)) {
        leaders.push((brand.slug.clone(), "fastest-growing portfolio".to_string()));
    }
    if let Some((brand, _)) = assessments.iter().max_by(|a, b| a.1.score.partial_cmp(&b.1.score).unwrap()) {
        leaders.push((brand.slug.clone(), "healthiest overall".to_string()));
    }

    leaders
}
