use crate::error::PipelineError;
use crate::extractors::contract::{parse_locale_number, PlatformExtractor};
use crate::models::{Platform, ProductRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};

const BASE_URL: &str = "https://www.ebay.com";
const BLOCK_SENTINELS: &[&str] = &["pardon our interruption", "unusual activity", "verify you're a person"];

static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"/itm/(\d+)").unwrap(),
        Regex::new(r"/itm/[^/]+/(\d+)").unwrap(),
        Regex::new(r"item=(\d+)").unwrap(),
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

/// Distinguishes the eBay listing type, referenced by `ProductRecord.buybox_owner`'s sibling
/// bid-count reasoning in the risk/demand calculators' upstream data (eBay has no rating field
/// per §4.2).
pub fn listing_type(document: &Html) -> &'static str {
    if text(document, "span.bidsCount, div.vim-bid-count").is_some() {
        "auction"
    } else if text(document, "a.best-offer, button[data-testid='ux-make-offer-action']").is_some() {
        "best_offer"
    } else {
        "fixed_price"
    }
}

pub struct EbayExtractor;

impl PlatformExtractor for EbayExtractor {
    fn platform(&self) -> Platform {
        Platform::EbayUs
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        ID_PATTERNS.iter().find_map(|re| re.captures(url).map(|c| c[1].to_string()))
    }

    fn block_sentinels(&self) -> &'static [&'static str] {
        BLOCK_SENTINELS
    }

    fn parse_product(&self, url: &str, html: &str) -> Result<Option<ProductRecord>, PipelineError> {
        if self.is_blocked(html) {
            return Err(PipelineError::block_detected("ebay_us"));
        }
        let external_id = match self.extract_id(url) {
            Some(id) => id,
            None => return Ok(None),
        };
        let document = Html::parse_document(html);

        let title = match text(&document, "h1.x-item-title__mainTitle, h1[itemprop='name']") {
            Some(t) => t,
            None => return Ok(None),
        };
        let price = match text(&document, "div.x-price-primary span.ux-textspans, span[itemprop='price']")
            .and_then(|t| parse_locale_number(&t))
            .and_then(|n| Decimal::try_from(n).ok())
        {
            Some(p) => p,
            None => return Ok(None),
        };

        let category = text(&document, "nav.breadcrumbs li:last-child a").unwrap_or_else(|| "Unknown".to_string());
        let image_url = attr(&document, "img.ux-image-carousel-item, img#icImg", "src");
        let in_stock = !text(&document, "div.d-quantity__availability")
            .map(|t| t.to_lowercase().contains("out of stock"))
            .unwrap_or(false);
        let seller_feedback_count = text(&document, "span.ux-textspans--SECONDARY")
            .and_then(|t| parse_locale_number(&t))
            .map(|n| n as u32)
            .unwrap_or(0);
        let listing = listing_type(&document);

        Ok(Some(ProductRecord {
            platform: Platform::EbayUs,
            external_id,
            url: url.to_string(),
            title,
            category,
            brand: None,
            image_url,
            price,
            original_price: None,
            discount_percent: None,
            rank: None, // no BSR-equivalent on eBay (§4.2)
            reviews: 0, // no product rating on eBay (§4.2)
            rating: 0.0,
            seller_count: 1,
            in_stock,
            delivery_days: None,
            // eBay has no buybox concept; this field instead carries the two signals the
            // competition/risk calculators can still read off an eBay listing (§4.2).
            buybox_owner: if seller_feedback_count > 0 {
                Some(format!("seller-feedback:{seller_feedback_count};listing:{listing}"))
            } else {
                Some(format!("listing:{listing}"))
            },
        }))
    }

    fn parse_discovery_urls(&self, html: &str, _category: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("a[href*='/itm/']") else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for el in document.select(&selector) {
            if let Some(href) = el.value().attr("href") {
                if let Some(id) = self.extract_id(href) {
                    let canonical = format!("{BASE_URL}/itm/{id}");
                    if seen.insert(canonical.clone()) {
                        urls.push(canonical);
                    }
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
    fn extracts_item_id() {
        let ext = EbayExtractor;
        assert_eq!(ext.extract_id("https://www.ebay.com/itm/123456789012"), Some("123456789012".to_string()));
    }

    #[test]
    fn no_rating_or_reviews_fields_populated() {
        let html = r#"
            <html><body>
              <h1 class="x-item-title__mainTitle">Vintage Watch</h1>
              <div class="x-price-primary"><span class="ux-textspans">$199.99</span></div>
            </body></html>
        "#;
        let ext = EbayExtractor;
        let record = ext.parse_product("https://www.ebay.com/itm/123456789012", html).unwrap().unwrap();
        assert_eq!(record.reviews, 0);
        assert_eq!(record.rating, 0.0);
        assert!(record.rank.is_none());
        assert_eq!(record.buybox_owner.as_deref(), Some("listing:fixed_price"));
    }

    #[test]
    fn auction_listing_is_distinguished_from_fixed_price() {
        let html = r#"
            <html><body>
              <h1 class="x-item-title__mainTitle">Rare Coin</h1>
              <div class="x-price-primary"><span class="ux-textspans">$50.00</span></div>
              <div class="vim-bid-count">12 bids</div>
            </body></html>
        "#;
        let ext = EbayExtractor;
        let record = ext.parse_product("https://www.ebay.com/itm/987654321098", html).unwrap().unwrap();
        assert_eq!(record.buybox_owner.as_deref(), Some("listing:auction"));
    }
}
