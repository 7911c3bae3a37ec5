use crate::error::PipelineError;
use crate::extractors::contract::PlatformExtractor;
use crate::models::{Platform, ProductRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

const BLOCK_SENTINELS: &[&str] = &["access denied", "request blocked"];

static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"/products/([^/?#]+)").unwrap(),
        Regex::new(r"variant=(\d+)").unwrap(),
    ]
});

/// Shape of the `products/{handle}.json` endpoint Shopify stores expose by default. The
/// extractor prefers this structured source and only falls back to DOM scraping on a 404 or
/// non-JSON response (§4.2 — "Host is not fixed").
#[derive(Debug, Deserialize)]
struct ShopifyProductJson {
    product: ShopifyProductJsonInner,
}

#[derive(Debug, Deserialize)]
struct ShopifyProductJsonInner {
    title: String,
    vendor: Option<String>,
    product_type: Option<String>,
    images: Vec<ShopifyImage>,
    variants: Vec<ShopifyVariant>,
}

#[derive(Debug, Deserialize)]
struct ShopifyImage {
    src: String,
}

#[derive(Debug, Deserialize)]
struct ShopifyVariant {
    price: String,
    compare_at_price: Option<String>,
    available: bool,
}

pub struct ShopifyExtractor;

impl ShopifyExtractor {
    pub fn store_domain(url: &str) -> Option<String> {
        Url::parse(url).ok().map(|u| u.host_str().unwrap_or_default().to_string())
    }

    /// Parses a `products/{handle}.json` response body. Exposed separately from
    /// `parse_product` so the scheduler can try the JSON endpoint first and fall back to
    /// `parse_product`'s DOM path without re-fetching.
    pub fn parse_product_json(url: &str, body: &str) -> Option<ProductRecord> {
        let parsed: ShopifyProductJson = serde_json::from_str(body).ok()?;
        let variant = parsed.product.variants.first()?;
        let price: Decimal = variant.price.parse().ok()?;
        let original_price: Option<Decimal> = variant
            .compare_at_price
            .as_ref()
            .and_then(|p| p.parse().ok())
            .filter(|&op: &Decimal| op > price);
        let discount_percent = original_price.map(|op| (op - price) / op * Decimal::from(100));

        Some(ProductRecord {
            platform: Platform::Shopify,
            external_id: Self::extract_handle(url).unwrap_or_else(|| parsed.product.title.clone()),
            url: url.to_string(),
            title: parsed.product.title,
            category: parsed.product.product_type.unwrap_or_else(|| "Unknown".to_string()),
            brand: parsed.product.vendor,
            image_url: parsed.product.images.first().map(|i| i.src.clone()),
            price,
            original_price,
            discount_percent,
            rank: None, // no bestseller rank concept on generic Shopify (§4.2)
            reviews: 0,
            rating: 0.0,
            seller_count: 1,
            in_stock: variant.available,
            delivery_days: None,
            buybox_owner: None,
        })
    }

    fn extract_handle(url: &str) -> Option<String> {
        ID_PATTERNS.iter().find_map(|re| re.captures(url).map(|c| c[1].to_string()))
    }
}

impl PlatformExtractor for ShopifyExtractor {
    fn platform(&self) -> Platform {
        Platform::Shopify
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        Self::extract_handle(url)
    }

    fn block_sentinels(&self) -> &'static [&'static str] {
        BLOCK_SENTINELS
    }

    fn parse_product(&self, url: &str, html: &str) -> Result<Option<ProductRecord>, PipelineError> {
        if self.is_blocked(html) {
            return Err(PipelineError::block_detected("shopify"));
        }
        let external_id = match self.extract_id(url) {
            Some(id) => id,
            None => return Ok(None),
        };

        let document = Html::parse_document(html);
        let title_sel = Selector::parse("h1.product-title, h1[itemprop='name'], meta[property='og:title']").ok();
        let title = title_sel.and_then(|sel| {
            document.select(&sel).next().and_then(|el| {
                el.value()
                    .attr("content")
                    .map(str::to_string)
                    .or_else(|| Some(el.text().collect::<String>().trim().to_string()))
            })
        }).filter(|s| !s.is_empty());
        let title = match title {
            Some(t) => t,
            None => return Ok(None),
        };

        let price_sel = Selector::parse("meta[property='og:price:amount'], span.price-item--regular").ok();
        let price = price_sel.and_then(|sel| {
            document.select(&sel).next().and_then(|el| {
                el.value()
                    .attr("content")
                    .map(str::to_string)
                    .or_else(|| Some(el.text().collect::<String>()))
            })
        }).and_then(|t| {
            let cleaned: String = t.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            cleaned.parse::<Decimal>().ok()
        });
        let price = match price {
            Some(p) => p,
            None => return Ok(None),
        };

        let vendor = Selector::parse("span.vendor, meta[property='product:brand']")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|el| el.text().collect::<String>().trim().to_string());

        Ok(Some(ProductRecord {
            platform: Platform::Shopify,
            external_id,
            url: url.to_string(),
            title,
            category: "Unknown".to_string(),
            brand: vendor,
            image_url: None,
            price,
            original_price: None,
            discount_percent: None,
            rank: None,
            reviews: 0,
            rating: 0.0,
            seller_count: 1,
            in_stock: true,
            delivery_days: None,
            buybox_owner: None,
        }))
    }

    fn parse_discovery_urls(&self, html: &str, _category: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("a[href*='/products/']") else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for el in document.select(&selector) {
            if let Some(href) = el.value().attr("href") {
                if seen.insert(href.to_string()) {
                    urls.push(href.to_string());
                }
            }
            if urls.len() >= 100 {
                break;
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_handle_from_products_path() {
        let ext = ShopifyExtractor;
        assert_eq!(
            ext.extract_id("https://my-store.myshopify.com/products/cozy-wool-sweater"),
            Some("cozy-wool-sweater".to_string())
        );
    }

    #[test]
    fn store_domain_is_extracted_from_host() {
        assert_eq!(
            ShopifyExtractor::store_domain("https://my-store.myshopify.com/products/x"),
            Some("my-store.myshopify.com".to_string())
        );
    }

    #[test]
    fn json_endpoint_is_preferred_source() {
        let body = r#"{
            "product": {
                "title": "Cozy Wool Sweater",
                "vendor": "Acme Knits",
                "product_type": "Apparel",
                "images": [{"src": "https://cdn.shop/img.jpg"}],
                "variants": [{"price": "59.99", "compare_at_price": "79.99", "available": true}]
            }
        }"#;
        let record = ShopifyExtractor::parse_product_json(
            "https://my-store.myshopify.com/products/cozy-wool-sweater",
            body,
        )
        .expect("record present");
        assert_eq!(record.title, "Cozy Wool Sweater");
        assert_eq!(record.price, Decimal::new(5999, 2));
        assert!(record.discount_percent.is_some());
    }

    #[test]
    fn falls_back_to_dom_on_non_json_body() {
        assert!(ShopifyExtractor::parse_product_json(
            "https://my-store.myshopify.com/products/x",
            "<html>not json</html>"
        )
        .is_none());
    }
}
