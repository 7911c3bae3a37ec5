use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::DailyMetric;

const MIN_DATA_POINTS: usize = 14;
const TRAILING_WINDOW: usize = 7;
const MIN_DISCOUNT_THRESHOLD: f64 = 0.05;
const MIN_EVENT_GAP_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct DiscountEvent {
    pub date: NaiveDate,
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub discount_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscountCyclePrediction {
    pub avg_cycle_days: Option<f64>,
    pub next_predicted_discount: Option<NaiveDate>,
    pub confidence: f64,
    pub historical_discounts: Vec<DiscountEvent>,
    pub typical_discount_percent: f64,
    pub interpretation: String,
}

/// # NDOC
/// component: `signals::discount_cycle`
/// purpose: Detects recurring discount events against a trailing 7-day price baseline and
///   projects the next likely discount (§4.3.6).
pub fn predict(metrics: &[DailyMetric]) -> DiscountCyclePrediction {
    if metrics.len() < MIN_DATA_POINTS {
        return DiscountCyclePrediction {
            avg_cycle_days: None,
            next_predicted_discount: None,
            confidence: 0.0,
            historical_discounts: Vec::new(),
            typical_discount_percent: 0.0,
            interpretation: "Insufficient price history (need 14+ days)".to_string(),
        };
    }

    let mut sorted: Vec<&DailyMetric> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.date);

    let discounts = detect_discounts(&sorted);

    if discounts.len() < 2 {
        return DiscountCyclePrediction {
            avg_cycle_days: None,
            next_predicted_discount: None,
            confidence: 0.1,
            typical_discount_percent: avg_discount(&discounts),
            historical_discounts: discounts,
            interpretation: "Not enough discount events to detect a cycle".to_string(),
        };
    }

    let (cycle_days, cycle_std) = cycle_stats(&discounts);
    let last_discount = discounts.last().unwrap();
    let next_predicted = last_discount.date + chrono::Duration::days(cycle_days as i64);
    let confidence = cycle_confidence(discounts.len(), cycle_std, cycle_days);
    let typical_discount = avg_discount(&discounts);
    let interpretation = format!(
        "{} confidence: ~{cycle_days:.0}-day discount cycle detected. Next discount ({typical_discount:.0}% typical) predicted around {next_predicted}.",
        confidence_label(confidence)
    );

    DiscountCyclePrediction {
        avg_cycle_days: Some((cycle_days * 10.0).round() / 10.0),
        next_predicted_discount: Some(next_predicted),
        confidence,
        historical_discounts: discounts,
        typical_discount_percent: typical_discount,
        interpretation,
    }
}

fn detect_discounts(metrics: &[&DailyMetric]) -> Vec<DiscountEvent> {
    let mut discounts: Vec<DiscountEvent> = Vec::new();
    if metrics.len() < TRAILING_WINDOW {
        return discounts;
    }

    for i in TRAILING_WINDOW..metrics.len() {
        let baseline_prices: Vec<f64> = metrics[i - TRAILING_WINDOW..i]
            .iter()
            .map(|m| m.price.to_f64().unwrap_or(0.0))
            .collect();
        let baseline = baseline_prices.iter().sum::<f64>() / baseline_prices.len() as f64;
        let current = metrics[i].price.to_f64().unwrap_or(0.0);

        if baseline <= 0.0 {
            continue;
        }
        let discount_pct = (baseline - current) / baseline;
        if discount_pct < MIN_DISCOUNT_THRESHOLD {
            continue;
        }

        let is_new_event = discounts
            .last()
            .map(|prev| (metrics[i].date - prev.date).num_days() > MIN_EVENT_GAP_DAYS)
            .unwrap_or(true);
        if !is_new_event {
            continue;
        }

        discounts.push(DiscountEvent {
            date: metrics[i].date,
            original_price: Decimal::try_from(baseline).unwrap_or(Decimal::ZERO),
            discounted_price: metrics[i].price,
            discount_percent: (discount_pct * 1000.0).round() / 10.0,
        });
    }

    discounts
}

fn cycle_stats(discounts: &[DiscountEvent]) -> (f64, f64) {
    if discounts.len() < 2 {
        return (0.0, 0.0);
    }
    let gaps: Vec<f64> = discounts.windows(2).map(|w| (w[1].date - w[0].date).num_days() as f64).collect();
    let avg_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let std_gap = if gaps.len() > 1 {
        let variance = gaps.iter().map(|g| (g - avg_gap).powi(2)).sum::<f64>() / (gaps.len() - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };
    (avg_gap, std_gap)
}

fn cycle_confidence(num_events: usize, cycle_std: f64, cycle_avg: f64) -> f64 {
    let base = if num_events >= 5 {
        0.7
    } else if num_events >= 3 {
        0.5
    } else {
        0.3
    };
    let consistency_factor = if cycle_avg > 0.0 { 1.0 - (cycle_std / cycle_avg).min(0.5) } else { 0.5 };
    (base * consistency_factor + 0.2).min(0.95)
}

fn avg_discount(discounts: &[DiscountEvent]) -> f64 {
    if discounts.is_empty() {
        return 0.0;
    }
    discounts.iter().map(|d| d.discount_percent).sum::<f64>() / discounts.len() as f64
}

fn confidence_label(confidence: f64) -> &'static str {
    if confidence > 0.7 {
        "High"
    } else if confidence > 0.4 {
        "Moderate"
    } else {
        "Low"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    fn metric(day: u32, price: i64) -> DailyMetric {
        DailyMetric {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            price: Decimal::new(price, 2),
            original_price: None,
            discount_percent: None,
            rank: Some(1000),
            reviews: 500,
            rating: 4.5,
            seller_count: 1,
            in_stock: true,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn fewer_than_fourteen_points_is_insufficient() {
        let metrics: Vec<DailyMetric> = (1..=10).map(|d| metric(d, 2999)).collect();
        let result = predict(&metrics);
        assert!(result.historical_discounts.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn recurring_discount_pattern_predicts_a_cycle() {
        // Stable price, with a >=5% discount every 7th day starting day 8.
        let mut metrics = Vec::new();
        for d in 1..=28u32 {
            let price = if d % 7 == 0 { 2700 } else { 3000 };
            metrics.push(metric(d, price));
        }
        let result = predict(&metrics);
        assert!(result.historical_discounts.len() >= 2, "expected repeated discount detection");
        assert!(result.avg_cycle_days.is_some());
        assert!(result.next_predicted_discount.is_some());
    }

    #[test]
    fn flat_price_series_detects_no_discounts() {
        let metrics: Vec<DailyMetric> = (1..=20).map(|d| metric(d, 2999)).collect();
        let result = predict(&metrics);
        assert!(result.historical_discounts.is_empty());
    }
}
