use crate::error::PipelineError;
use crate::extractors::contract::{parse_locale_number, PlatformExtractor};
use crate::models::{Platform, ProductRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};

struct Selectors {
    title: &'static str,
    title_alt: &'static str,
    price: &'static str,
    price_alt: &'static str,
    rating: &'static str,
    reviews: &'static str,
    brand: &'static str,
    image: &'static str,
    category: &'static str,
    add_to_cart: &'static str,
    seller: &'static str,
}

const SELECTORS: Selectors = Selectors {
    title: "h1[itemprop='name']",
    title_alt: "[data-testid='product-title']",
    price: "[itemprop='price']",
    price_alt: "[data-testid='price-wrap'] span",
    rating: "[itemprop='ratingValue']",
    reviews: "[itemprop='reviewCount']",
    brand: "[itemprop='brand']",
    image: "[data-testid='hero-image'] img",
    category: "[data-testid='breadcrumb'] li:nth-child(2) a",
    add_to_cart: "[data-testid='add-to-cart-btn']",
    seller: "[data-testid='sold-shipped-by'] span",
};

const BLOCK_SENTINELS: &[&str] = &["Robot or human?", "are you a human", "blocked"];

static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"/ip/[^/]+/(\d+)").unwrap(),
        Regex::new(r"/ip/(\d+)").unwrap(),
        Regex::new(r"[?&]irgwc=(\d+)").unwrap(),
    ]
});

fn text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn attr(document: &Html, selector: &str, name: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr(name))
        .map(str::to_string)
}

pub struct WalmartExtractor;

impl PlatformExtractor for WalmartExtractor {
    fn platform(&self) -> Platform {
        Platform::WalmartUs
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        ID_PATTERNS.iter().find_map(|re| re.captures(url).map(|c| c[1].to_string()))
    }

    fn block_sentinels(&self) -> &'static [&'static str] {
        BLOCK_SENTINELS
    }

    fn parse_product(&self, url: &str, html: &str) -> Result<Option<ProductRecord>, PipelineError> {
        if self.is_blocked(html) {
            return Err(PipelineError::block_detected("walmart_us"));
        }
        let external_id = match self.extract_id(url) {
            Some(id) => id,
            None => return Ok(None),
        };
        let document = Html::parse_document(html);

        let title = text(&document, SELECTORS.title).or_else(|| text(&document, SELECTORS.title_alt));
        let title = match title {
            Some(t) => t,
            None => return Ok(None),
        };

        let price = text(&document, SELECTORS.price)
            .or_else(|| text(&document, SELECTORS.price_alt))
            .and_then(|t| parse_locale_number(&t))
            .and_then(|n| Decimal::try_from(n).ok());
        let price = match price {
            Some(p) => p,
            None => return Ok(None),
        };

        let rating = text(&document, SELECTORS.rating).and_then(|t| parse_locale_number(&t)).unwrap_or(0.0);
        let reviews = text(&document, SELECTORS.reviews)
            .and_then(|t| parse_locale_number(&t))
            .map(|n| n as u64)
            .unwrap_or(0);
        let brand = text(&document, SELECTORS.brand);
        let image_url = attr(&document, SELECTORS.image, "src");
        let category = text(&document, SELECTORS.category).unwrap_or_else(|| "General".to_string());
        let in_stock = Selector::parse(SELECTORS.add_to_cart)
            .ok()
            .map(|sel| document.select(&sel).next().is_some())
            .unwrap_or(true);
        let seller = text(&document, SELECTORS.seller);
        let buybox_owner = seller.clone().or_else(|| Some("Walmart".to_string()));
        let _fulfillment_type = match &seller {
            Some(s) if s.contains("Walmart") => "Walmart",
            _ => "Marketplace seller",
        };

        Ok(Some(ProductRecord {
            platform: Platform::WalmartUs,
            external_id,
            url: url.to_string(),
            title,
            category,
            brand,
            image_url,
            price,
            original_price: None,
            discount_percent: None,
            rank: None, // not exposed (§4.2)
            reviews,
            rating,
            seller_count: 1,
            in_stock,
            delivery_days: None,
            buybox_owner,
        }))
    }

    fn parse_discovery_urls(&self, html: &str, _category: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("a[href*='/ip/']") else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for el in document.select(&selector) {
            if let Some(href) = el.value().attr("href") {
                let full = if href.starts_with("http") {
                    href.to_string()
                } else {
                    format!("https://www.walmart.com{href}")
                };
                if seen.insert(full.clone()) {
                    urls.push(full);
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
    fn extracts_id_from_ip_path_with_slug() {
        let ext = WalmartExtractor;
        assert_eq!(
            ext.extract_id("https://www.walmart.com/ip/some-product-name/123456"),
            Some("123456".to_string())
        );
    }

    #[test]
    fn rank_is_always_absent() {
        let html = r#"
            <html><body>
              <h1 itemprop="name">Blender</h1>
              <span itemprop="price">49.99</span>
            </body></html>
        "#;
        let ext = WalmartExtractor;
        let record = ext
            .parse_product("https://www.walmart.com/ip/123456", html)
            .unwrap()
            .unwrap();
        assert!(record.rank.is_none());
    }
}
