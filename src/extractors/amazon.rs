use crate::error::PipelineError;
use crate::extractors::contract::{parse_locale_number, PlatformExtractor};
use crate::models::{Platform, ProductRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::collections::HashMap;

const BASE_URL: &str = "https://www.amazon.com";

/// Single versioned selector table (§9 Design Notes): a replacement is a one-line change here.
struct Selectors {
    title: &'static str,
    price: &'static str,
    original_price: &'static str,
    rating: &'static str,
    reviews: &'static str,
    rank: &'static str,
    rank_alt: &'static str,
    category: &'static str,
    brand: &'static str,
    image: &'static str,
    availability: &'static str,
    seller_count: &'static str,
    buybox_seller: &'static str,
    delivery: &'static str,
}

const SELECTORS: Selectors = Selectors {
    title: "#productTitle",
    price: "span.a-price span.a-offscreen",
    original_price: "span.a-price.a-text-price span.a-offscreen",
    rating: "#acrPopover span.a-size-base",
    reviews: "#acrCustomerReviewText",
    rank: "#productDetails_detailBullets_sections1 td",
    rank_alt: "#detailBullets_feature_div li",
    category: "#wayfinding-breadcrumbs_feature_div ul li:last-child a",
    brand: "#bylineInfo",
    image: "#landingImage",
    availability: "#availability span",
    seller_count: "#olp-upd-new a",
    buybox_seller: "#sellerProfileTriggerId",
    delivery: "#delivery-message",
};

const BLOCK_SENTINELS: &[&str] = &[
    "Enter the characters you see below",
    "Sorry, we just need to make sure you're not a robot",
    "Type the characters you see in this image",
];

static ASIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)/dp/([A-Z0-9]{10})").unwrap(),
        Regex::new(r"(?i)/gp/product/([A-Z0-9]{10})").unwrap(),
        Regex::new(r"(?i)asin=([A-Z0-9]{10})").unwrap(),
    ]
});

fn category_bestseller_path(category: &str) -> &'static str {
    let map: HashMap<&str, &str> = HashMap::from([
        ("Electronics", "/gp/bestsellers/electronics"),
        ("Home & Kitchen", "/gp/bestsellers/home-garden"),
        ("Toys & Games", "/gp/bestsellers/toys-and-games"),
        ("Sports & Outdoors", "/gp/bestsellers/sporting-goods"),
        ("Beauty & Personal Care", "/gp/bestsellers/beauty"),
        ("Health & Household", "/gp/bestsellers/hpc"),
        ("Clothing", "/gp/bestsellers/fashion"),
        ("Books", "/gp/bestsellers/books"),
    ]);
    map.get(category).copied().unwrap_or("/gp/bestsellers")
}

pub struct AmazonExtractor;

impl AmazonExtractor {
    fn select_text(document: &Html, selector: &str) -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(str::to_string)
    }

    fn parse_price(document: &Html, selector: &str) -> Option<Decimal> {
        let text = Self::select_text(document, selector)?;
        let number = parse_locale_number(&text)?;
        Decimal::try_from(number).ok()
    }

    fn parse_rank(document: &Html) -> Option<u32> {
        for selector in [SELECTORS.rank, SELECTORS.rank_alt] {
            if let Some(text) = Self::select_text(document, selector) {
                if text.to_lowercase().contains("best sellers rank") {
                    if let Some(n) = parse_locale_number(&text) {
                        return Some(n as u32);
                    }
                }
            }
        }
        None
    }
}

impl PlatformExtractor for AmazonExtractor {
    fn platform(&self) -> Platform {
        Platform::AmazonUs
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        ASIN_PATTERNS
            .iter()
            .find_map(|re| re.captures(url).map(|c| c[1].to_uppercase()))
    }

    fn block_sentinels(&self) -> &'static [&'static str] {
        BLOCK_SENTINELS
    }

    fn parse_product(&self, url: &str, html: &str) -> Result<Option<ProductRecord>, PipelineError> {
        if self.is_blocked(html) {
            return Err(PipelineError::block_detected("amazon_us"));
        }

        let external_id = match self.extract_id(url) {
            Some(id) => id,
            None => return Ok(None),
        };

        let document = Html::parse_document(html);

        let title = match Self::select_text(&document, SELECTORS.title) {
            Some(t) => t,
            None => return Ok(None),
        };

        let price = match Self::parse_price(&document, SELECTORS.price) {
            Some(p) => p,
            None => return Ok(None),
        };
        let original_price = Self::parse_price(&document, SELECTORS.original_price);

        let discount_percent = original_price
            .filter(|&op| op > price)
            .map(|op| (op - price) / op * Decimal::from(100));

        let rating = Self::select_text(&document, SELECTORS.rating)
            .and_then(|t| parse_locale_number(&t))
            .unwrap_or(0.0);
        let reviews = Self::select_text(&document, SELECTORS.reviews)
            .and_then(|t| parse_locale_number(&t))
            .map(|n| n as u64)
            .unwrap_or(0);
        let rank = Self::parse_rank(&document);
        let category = Self::select_text(&document, SELECTORS.category)
            .unwrap_or_else(|| "Unknown".to_string());
        let brand = Self::select_text(&document, SELECTORS.brand)
            .map(|t| t.replace("Visit the", "").replace("Store", "").replace("Brand:", "").trim().to_string());
        let image_url = Self::select_attr(&document, SELECTORS.image, "src");
        let in_stock = Self::select_text(&document, SELECTORS.availability)
            .map(|t| {
                let lower = t.to_lowercase();
                !["out of stock", "unavailable", "currently unavailable"]
                    .iter()
                    .any(|phrase| lower.contains(phrase))
            })
            .unwrap_or(true);
        let seller_count = Self::select_text(&document, SELECTORS.seller_count)
            .and_then(|t| parse_locale_number(&t))
            .map(|n| n as u32)
            .unwrap_or(1)
            .max(1);
        let buybox_owner = Self::select_text(&document, SELECTORS.buybox_seller);
        let delivery_days = Self::select_text(&document, SELECTORS.delivery)
            .filter(|t| t.to_lowercase().contains("tomorrow"))
            .map(|_| 1);

        Ok(Some(ProductRecord {
            platform: Platform::AmazonUs,
            external_id,
            url: url.to_string(),
            title,
            category,
            brand,
            image_url,
            price,
            original_price,
            discount_percent,
            rank,
            reviews,
            rating,
            seller_count,
            in_stock,
            delivery_days,
            buybox_owner,
        }))
    }

    fn parse_discovery_urls(&self, html: &str, category: &str) -> Vec<String> {
        let _ = category_bestseller_path(category);
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if !href.contains("/dp/") {
                continue;
            }
            if let Some(asin) = self.extract_id(href) {
                if seen.insert(asin.clone()) {
                    urls.push(format!("{BASE_URL}/dp/{asin}"));
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
    fn extracts_asin_from_dp_path() {
        let ext = AmazonExtractor;
        assert_eq!(
            ext.extract_id("https://www.amazon.com/dp/B08N5WRWNW"),
            Some("B08N5WRWNW".to_string())
        );
    }

    #[test]
    fn extracts_asin_from_gp_product_path() {
        let ext = AmazonExtractor;
        assert_eq!(
            ext.extract_id("https://www.amazon.com/gp/product/b08n5wrwnw"),
            Some("B08N5WRWNW".to_string())
        );
    }

    #[test]
    fn non_amazon_url_has_no_asin() {
        let ext = AmazonExtractor;
        assert_eq!(ext.extract_id("https://www.amazon.com/s?k=laptop"), None);
    }

    #[test]
    fn detects_block_page() {
        let ext = AmazonExtractor;
        assert!(ext.is_blocked("<html>Enter the characters you see below</html>"));
        assert!(!ext.is_blocked("<html>#productTitle Widget</html>"));
    }

    #[test]
    fn parses_a_minimal_product_page() {
        let ext = AmazonExtractor;
        let html = r#"
            <html><body>
              <span id="productTitle">Widget 3000</span>
              <span class="a-price"><span class="a-offscreen">$29.99</span></span>
              <span id="availability"><span>In Stock</span></span>
            </body></html>
        "#;
        let record = ext
            .parse_product("https://www.amazon.com/dp/B08N5WRWNW", html)
            .unwrap()
            .expect("record present");
        assert_eq!(record.external_id, "B08N5WRWNW");
        assert_eq!(record.title, "Widget 3000");
        assert_eq!(record.price, Decimal::new(2999, 2));
        assert!(record.in_stock);
    }

    #[test]
    fn missing_price_yields_no_record() {
        let ext = AmazonExtractor;
        let html = r#"<html><body><span id="productTitle">Widget</span></body></html>"#;
        let record = ext
            .parse_product("https://www.amazon.com/dp/B08N5WRWNW", html)
            .unwrap();
        assert!(record.is_none());
    }
}
