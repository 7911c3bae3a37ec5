use crate::error::PipelineError;
use crate::extractors::contract::{parse_locale_number, PlatformExtractor};
use crate::models::{Platform, ProductRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};

const BASE_URL: &str = "https://www.flipkart.com";

struct Selectors {
    title: &'static str,
    price: &'static str,
    original_price: &'static str,
    rating: &'static str,
    reviews: &'static str,
    category: &'static str,
    brand: &'static str,
    image: &'static str,
    availability: &'static str,
    seller: &'static str,
}

const SELECTORS: Selectors = Selectors {
    title: "span.VU-ZEz, h1._6EBuvT, span.B_NuCI",
    price: "div.Nx9bqj.CxhGGd, div._30jeq3._16Jk6d",
    original_price: "div.yRaY8j, div._3I9_wc._2p6lqe",
    rating: "div.XQDdHH, div._3LWZlK",
    reviews: "span.Wphh3N span:last-child, span._2_R_DZ span",
    category: "div._1MR4o5 a, div._3GIHBu a",
    brand: "span.mEh187, div._2WkVRV",
    image: "img._396cs4._2amPTt._3qGmMb, img._2r_T1I",
    availability: "div._16FRp0, div.Z8JjpR",
    seller: "div._1RLviB span, #sellerName span",
};

const BLOCK_SENTINELS: &[&str] = &["Access Denied", "Please verify you are a human", "captcha", "robot"];

static FSN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)pid=([A-Z0-9]+)").unwrap(),
        Regex::new(r"(?i)/p/([a-z]+)\?").unwrap(),
        Regex::new(r"(?i)itm([A-Za-z0-9]+)").unwrap(),
    ]
});

fn first_matching_text(document: &Html, comma_separated_selectors: &str) -> Option<String> {
    for raw in comma_separated_selectors.split(", ") {
        if let Ok(sel) = Selector::parse(raw.trim()) {
            if let Some(el) = document.select(&sel).next() {
                let text = el.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

fn first_matching_attr(document: &Html, comma_separated_selectors: &str, attr: &str) -> Option<String> {
    for raw in comma_separated_selectors.split(", ") {
        if let Ok(sel) = Selector::parse(raw.trim()) {
            if let Some(el) = document.select(&sel).next() {
                if let Some(value) = el.value().attr(attr) {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

pub struct FlipkartExtractor;

impl PlatformExtractor for FlipkartExtractor {
    fn platform(&self) -> Platform {
        Platform::FlipkartIn
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        if let Some(id) = FSN_PATTERNS.iter().find_map(|re| re.captures(url).map(|c| c[1].to_uppercase())) {
            return Some(id);
        }
        if let Some(idx) = url.find("/p/") {
            let rest = &url[idx + 3..];
            let pid_part = rest.split('?').next()?.split('/').next()?;
            if !pid_part.is_empty() {
                return Some(pid_part.to_uppercase());
            }
        }
        None
    }

    fn block_sentinels(&self) -> &'static [&'static str] {
        BLOCK_SENTINELS
    }

    fn parse_product(&self, url: &str, html: &str) -> Result<Option<ProductRecord>, PipelineError> {
        if self.is_blocked(html) {
            return Err(PipelineError::block_detected("flipkart_in"));
        }

        let external_id = match self.extract_id(url) {
            Some(id) => id,
            None => return Ok(None),
        };

        let document = Html::parse_document(html);

        let title = match first_matching_text(&document, SELECTORS.title) {
            Some(t) => t,
            None => return Ok(None),
        };

        let price = match first_matching_text(&document, SELECTORS.price)
            .and_then(|t| parse_locale_number(&t))
            .and_then(|n| Decimal::try_from(n).ok())
        {
            Some(p) => p,
            None => return Ok(None),
        };
        let original_price = first_matching_text(&document, SELECTORS.original_price)
            .and_then(|t| parse_locale_number(&t))
            .and_then(|n| Decimal::try_from(n).ok());
        let discount_percent = original_price
            .filter(|&op| op > price)
            .map(|op| (op - price) / op * Decimal::from(100));

        let rating = first_matching_text(&document, SELECTORS.rating)
            .and_then(|t| parse_locale_number(&t))
            .unwrap_or(0.0);
        let reviews = first_matching_text(&document, SELECTORS.reviews)
            .and_then(|t| parse_locale_number(&t))
            .map(|n| n as u64)
            .unwrap_or(0);
        let category = first_matching_text(&document, SELECTORS.category).unwrap_or_else(|| "Unknown".to_string());
        let brand = first_matching_text(&document, SELECTORS.brand);
        let image_url = first_matching_attr(&document, SELECTORS.image, "src");
        let in_stock = first_matching_text(&document, SELECTORS.availability)
            .map(|t| {
                let lower = t.to_lowercase();
                !["sold out", "out of stock", "currently unavailable"]
                    .iter()
                    .any(|p| lower.contains(p))
            })
            .unwrap_or(true);
        let buybox_owner = first_matching_text(&document, SELECTORS.seller);

        Ok(Some(ProductRecord {
            platform: Platform::FlipkartIn,
            external_id,
            url: url.to_string(),
            title,
            category,
            brand,
            image_url,
            price,
            original_price,
            discount_percent,
            rank: None, // BSR not available (§4.2)
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
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let full = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{BASE_URL}{href}")
            };
            if full.contains("/p/") || full.contains("pid=") {
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
