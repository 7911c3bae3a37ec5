use chrono::{NaiveDate, DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// # NDOC
/// component: `models`
/// purpose: The six retail platforms this pipeline extracts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    AmazonUs,
    FlipkartIn,
    WalmartUs,
    AlibabaCn,
    EbayUs,
    Shopify,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::AmazonUs => "amazon_us",
            Platform::FlipkartIn => "flipkart_in",
            Platform::WalmartUs => "walmart_us",
            Platform::AlibabaCn => "alibaba_cn",
            Platform::EbayUs => "ebay_us",
            Platform::Shopify => "shopify",
        }
    }

    /// ISO country the platform's default storefront serves, used by the arbitrage analyzer's
    /// tax/shipping/duty lookups.
    pub fn country(&self) -> &'static str {
        match self {
            Platform::AmazonUs => "US",
            Platform::FlipkartIn => "IN",
            Platform::WalmartUs => "US",
            Platform::AlibabaCn => "CN",
            Platform::EbayUs => "US",
            Platform::Shopify => "US",
        }
    }

    pub fn native_currency(&self) -> &'static str {
        match self {
            Platform::AmazonUs => "USD",
            Platform::FlipkartIn => "INR",
            Platform::WalmartUs => "USD",
            Platform::AlibabaCn => "CNY",
            Platform::EbayUs => "USD",
            Platform::Shopify => "USD",
        }
    }
}

/// Unique (platform, external_id); created on first successful scrape, mutated only by
/// metadata refreshes, never deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub platform: Platform,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub category: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row per product per calendar day. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetric {
    pub platform: Platform,
    pub external_id: String,
    pub date: NaiveDate,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub rank: Option<u32>,
    pub reviews: u64,
    pub rating: f64,
    pub seller_count: u32,
    pub in_stock: bool,
    pub delivery_days: Option<u32>,
    pub buybox_owner: Option<String>,
}

impl DailyMetric {
    /// Enforces the §3 invariants that relate price, original_price, and discount_percent.
    /// Returns `false` when a caller has constructed an inconsistent record; the pipeline
    /// never persists a metric that fails this check.
    pub fn is_consistent(&self) -> bool {
        if self.price < Decimal::ZERO {
            return false;
        }
        if let Some(original) = self.original_price {
            if original < self.price {
                return false;
            }
            if let Some(discount) = self.discount_percent {
                let expected = (original - self.price) / original * Decimal::from(100);
                if (expected - discount).abs() > Decimal::new(1, 2) {
                    return false;
                }
            }
        }
        if self.rating < 0.0 || self.rating > 5.0 {
            return false;
        }
        self.seller_count >= 1
    }
}

/// The normalized shape an extractor produces: a union of `Product` + the latest `DailyMetric`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub platform: Platform,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub category: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub rank: Option<u32>,
    pub reviews: u64,
    pub rating: f64,
    pub seller_count: u32,
    pub in_stock: bool,
    pub delivery_days: Option<u32>,
    pub buybox_owner: Option<String>,
}

impl ProductRecord {
    /// `created_at` is supplied by the caller (the persistence layer preserves it across
    /// re-scrapes of the same product; only a first-ever sighting should pass `Utc::now()`).
    pub fn product(&self, created_at: DateTime<Utc>) -> Product {
        Product {
            platform: self.platform,
            external_id: self.external_id.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            brand: self.brand.clone(),
            image_url: self.image_url.clone(),
            created_at,
        }
    }

    pub fn daily_metric(&self, date: NaiveDate) -> DailyMetric {
        DailyMetric {
            platform: self.platform,
            external_id: self.external_id.clone(),
            date,
            price: self.price,
            original_price: self.original_price,
            discount_percent: self.discount_percent,
            rank: self.rank,
            reviews: self.reviews,
            rating: self.rating,
            seller_count: self.seller_count,
            in_stock: self.in_stock,
            delivery_days: self.delivery_days,
            buybox_owner: self.buybox_owner.clone(),
        }
    }
}

/// Unique (platform, slug); created on first association, mutated by metadata refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub platform: Platform,
    pub slug: String,
    pub name: String,
    pub category: Option<String>,
}

/// Append-only aggregate over a brand's products for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandMetric {
    pub date: NaiveDate,
    pub product_count: u32,
    pub avg_price: Decimal,
    pub avg_rating: f64,
    pub total_reviews: u64,
    pub review_velocity: f64,
    pub avg_rank: Option<f64>,
    pub revenue_estimate: Decimal,
    pub market_share_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PriceDrop,
    Stockout,
    TrendChange,
    RankChange,
    Arbitrage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Webhook,
    McpQueue,
    Email,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Webhook => "webhook",
            ChannelKind::McpQueue => "mcp",
            ChannelKind::Email => "email",
        }
    }
}

/// Created explicitly; `is_active` is the only mutable field short of deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSubscription {
    pub id: String,
    pub user_id: String,
    pub alert_type: AlertType,
    pub product_external_id: Option<String>,
    pub brand_slug: Option<String>,
    pub category: Option<String>,
    pub platform: Platform,
    pub threshold_value: Option<Decimal>,
    pub threshold_percent: Option<f64>,
    pub channel: ChannelKind,
    pub webhook_url: Option<String>,
    pub is_active: bool,
}

/// Append-only; `acknowledged` is the only mutable field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: String,
    pub subscription_id: String,
    pub event_type: String,
    pub event_data: Value,
    pub previous_value: Option<String>,
    pub current_value: Option<String>,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// One region's native-currency price observation, feeding the arbitrage analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalPrice {
    pub platform: Platform,
    pub country: String,
    pub currency: String,
    pub price_native: Decimal,
    pub in_stock: bool,
    pub url: Option<String>,
}
