use crate::arbitrage::GlobalPriceComparison;
use crate::intelligence::ProductIntelligence;
use crate::models::ProductRecord;

/// # NDOC
/// component: `reporting::format_product_analysis`
/// purpose: Renders a `ProductIntelligence` bundle as a Markdown report (§4.8), in the same
///   heading/table shape as the category-insights report built by the competitive analysis tool.
pub fn format_product_analysis(product: &ProductRecord, intel: &ProductIntelligence, analysis_date: &str) -> String {
    let mut lines = Vec::new();

    lines.push(format!("# Product Analysis: {}", truncate(&product.title, 60)));
    lines.push(format!("**External ID:** {} | **Platform:** {}", product.external_id, product.platform.as_str()));
    lines.push(String::new());

    lines.push("## Executive Summary".to_string());
    lines.push(format!("**Overall Score:** {:.1}/100", intel.overall_score));
    lines.push(format!("**Confidence:** {:.0}%", intel.confidence * 100.0));
    lines.push(String::new());
    lines.push(format!("> {}", intel.verdict));
    lines.push(String::new());

    lines.push("## Key Metrics".to_string());
    lines.push("| Metric | Value |".to_string());
    lines.push("|--------|-------|".to_string());
    lines.push(format!("| **Est. Monthly Revenue** | ${:.2} |", intel.revenue.estimated_monthly_revenue));
    lines.push(format!("| **Est. Daily Sales** | {:.1} units |", intel.revenue.estimated_daily_sales));
    lines.push(format!("| **Current Price** | ${} |", product.price));
    match product.rank {
        Some(rank) => lines.push(format!("| **Rank** | #{rank} |")),
        None => lines.push("| **Rank** | N/A |".to_string()),
    }
    lines.push(format!("| **Reviews** | {} |", product.reviews));
    lines.push(format!("| **Rating** | {:.1} |", product.rating));
    lines.push(String::new());

    lines.push("## Intelligence Scores".to_string());
    lines.push("| Score | Value | Interpretation |".to_string());
    lines.push("|-------|-------|----------------|".to_string());
    lines.push(format!("| **Demand** | {:.0}/100 | {} |", intel.demand.score, truncate(&intel.demand.interpretation, 50)));
    lines.push(format!("| **Competition** | {:.0}/100 | {} barrier |", intel.competition.score, intel.competition.barrier_to_entry));
    lines.push(format!("| **Trend** | {:+.0} | {} |", intel.trend.score, intel.trend.trend_direction));
    lines.push(format!("| **Risk** | {:.0}/100 | {} |", intel.risk.score, intel.risk.risk_level));
    lines.push(String::new());

    if intel.discount_cycle.next_predicted_discount.is_some() {
        lines.push("## Discount Prediction".to_string());
        lines.push(intel.discount_cycle.interpretation.clone());
        lines.push(String::new());
    }

    if !intel.risk.flags.is_empty() {
        lines.push("## Risk Flags".to_string());
        for flag in &intel.risk.flags {
            lines.push(format!("- **{}**: {}", flag.severity.to_uppercase(), flag.description));
        }
        lines.push(String::new());
    }

    lines.push("## Actionable Insights".to_string());
    for (i, insight) in intel.insights.iter().enumerate() {
        lines.push(format!("{}. {insight}", i + 1));
    }
    lines.push(String::new());

    lines.push("---".to_string());
    lines.push(format!("*Analysis date: {analysis_date} | {}*", intel.revenue.methodology));

    lines.join("\n")
}

/// Renders an arbitrage `GlobalPriceComparison` as a Markdown report (§4.8).
pub fn format_arbitrage_comparison(comparison: &GlobalPriceComparison) -> String {
    let mut lines = Vec::new();

    lines.push("# Global Price Comparison".to_string());
    lines.push(format!("**Product:** {}", truncate(&comparison.product_title, 60)));
    lines.push(String::new());

    lines.push("## Price Analysis".to_string());
    lines.push(format!("- **Spread:** {:.1}%", comparison.price_spread_percent));
    lines.push(String::new());

    if comparison.opportunities.is_empty() {
        lines.push("## Arbitrage Opportunities".to_string());
        lines.push("No profitable arbitrage opportunities found after accounting for shipping and import duties.".to_string());
        lines.push(String::new());
    } else {
        lines.push("## Arbitrage Opportunities".to_string());
        for opp in &comparison.opportunities {
            lines.push(format!("### {} -> {}", opp.buy_from.country, opp.sell_to.country));
            lines.push("| Detail | Value |".to_string());
            lines.push("|--------|-------|".to_string());
            lines.push(format!("| **Buy at** | ${} ({}) |", opp.buy_from.price_native, opp.buy_from.country));
            lines.push(format!("| **Sell at** | {} ({}) |", opp.sell_to.price_native, opp.sell_to.country));
            lines.push(format!("| **Net Margin** | ${} ({:.1}%) |", opp.margin_usd, opp.margin_percent));
            lines.push(format!("| **Status** | {} |", if opp.profitable { "Profitable" } else { "Not Profitable" }));
            lines.push(String::new());
            lines.push(opp.notes.clone());
            lines.push(String::new());
        }
    }

    lines.push("## Recommendation".to_string());
    lines.push(comparison.recommendation.clone());
    lines.push(String::new());

    lines.push("---".to_string());
    lines.push("*Cross-border arbitrage analysis. Currency rates may fluctuate.*".to_string());

    lines.join("\n")
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::{ArbitrageOpportunity, GlobalPriceComparison};
    use crate::intelligence::analyze_product;
    use crate::models::{Platform, RegionalPrice};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn product() -> ProductRecord {
        ProductRecord {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            url: "https://www.amazon.com/dp/B000TEST01".to_string(),
            title: "Test Widget With A Very Long Name That Exceeds Sixty Characters Easily".to_string(),
            category: "Electronics".to_string(),
            brand: None,
            image_url: None,
            price: Decimal::new(2999, 2),
            original_price: None,
            discount_percent: None,
            rank: Some(1000),
            reviews: 500,
            rating: 4.5,
            seller_count: 3,
            in_stock: true,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn product_report_contains_headers_and_truncated_title() {
        let metrics: Vec<crate::models::DailyMetric> = (1..=20u32)
            .map(|d| crate::models::DailyMetric {
                platform: Platform::AmazonUs,
                external_id: "B000TEST01".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 1, d).unwrap(),
                price: Decimal::new(2999, 2),
                original_price: None,
                discount_percent: None,
                rank: Some(1000),
                reviews: d as u64 * 10,
                rating: 4.5,
                seller_count: 3,
                in_stock: true,
                delivery_days: None,
                buybox_owner: Some("amazon.com".to_string()),
            })
            .collect();
        let today = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let intel = analyze_product(&metrics, "Electronics", today);
        let report = format_product_analysis(&product(), &intel, "2026-01-20");
        assert!(report.contains("# Product Analysis"));
        assert!(report.contains("## Executive Summary"));
        assert!(report.contains("..."));
    }

    #[test]
    fn arbitrage_report_reflects_no_opportunities() {
        let comparison = GlobalPriceComparison {
            product_title: "Widget".to_string(),
            price_spread_percent: 3.0,
            opportunities: Vec::new(),
            recommendation: "Prices are well-aligned.".to_string(),
        };
        let report = format_arbitrage_comparison(&comparison);
        assert!(report.contains("No profitable arbitrage opportunities"));
    }

    #[test]
    fn arbitrage_report_lists_each_opportunity() {
        let opp = ArbitrageOpportunity {
            buy_from: RegionalPrice { platform: Platform::AmazonUs, country: "US".to_string(), currency: "USD".to_string(), price_native: Decimal::new(1999, 2), in_stock: true, url: None },
            sell_to: RegionalPrice { platform: Platform::FlipkartIn, country: "IN".to_string(), currency: "INR".to_string(), price_native: Decimal::new(350000, 2), in_stock: true, url: None },
            margin_usd: Decimal::new(1500, 2),
            margin_percent: 25.0,
            profitable: true,
            notes: "Good margin".to_string(),
        };
        let comparison = GlobalPriceComparison {
            product_title: "Widget".to_string(),
            price_spread_percent: 40.0,
            opportunities: vec![opp],
            recommendation: "Buy in US, sell in IN.".to_string(),
        };
        let report = format_arbitrage_comparison(&comparison);
        assert!(report.contains("US -> IN"));
        assert!(report.contains("Profitable"));
    }
}
