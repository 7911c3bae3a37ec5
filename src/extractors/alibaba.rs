use crate::error::PipelineError;
use crate::extractors::contract::{parse_locale_number, PlatformExtractor};
use crate::models::{Platform, ProductRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};

const BLOCK_SENTINELS: &[&str] = &["verify you are human", "unusual traffic", "captcha"];

static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"/item/(\d+)\.html").unwrap(),
        Regex::new(r"/product-detail/[^/]+_(\d+)\.html").unwrap(),
        Regex::new(r"productId=(\d+)").unwrap(),
        Regex::new(r"/(\d+)\.html").unwrap(),
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

/// # NDOC
/// component: `extractors::alibaba`
/// purpose: Two sub-parsers behind one extractor (§4.2): AliExpress (retail) and Alibaba
///   (B2B/wholesale), distinguished by hostname. Discovery is not implemented for this
///   platform per spec — `parse_discovery_urls` always returns empty.
pub struct AlibabaExtractor;

impl AlibabaExtractor {
    pub fn is_aliexpress(url: &str) -> bool {
        url.to_lowercase().contains("aliexpress")
    }
}

impl PlatformExtractor for AlibabaExtractor {
    fn platform(&self) -> Platform {
        Platform::AlibabaCn
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        ID_PATTERNS.iter().find_map(|re| re.captures(url).map(|c| c[1].to_string()))
    }

    fn block_sentinels(&self) -> &'static [&'static str] {
        BLOCK_SENTINELS
    }

    fn parse_product(&self, url: &str, html: &str) -> Result<Option<ProductRecord>, PipelineError> {
        if self.is_blocked(html) {
            return Err(PipelineError::block_detected("alibaba_cn"));
        }
        let external_id = match self.extract_id(url) {
            Some(id) => id,
            None => return Ok(None),
        };
        let document = Html::parse_document(html);

        let retail = Self::is_aliexpress(url);
        let (title_sel, price_sel) = if retail {
            ("h1.product-title-text, h1[data-pl='product-title']", "span.product-price-value, div.uniform-banner-box-price")
        } else {
            ("h1.module-pdp-title, h1.title", "div.price-item, span.price-range")
        };

        let title = match text(&document, title_sel) {
            Some(t) => t,
            None => return Ok(None),
        };
        let price = match text(&document, price_sel)
            .and_then(|t| parse_locale_number(&t))
            .and_then(|n| Decimal::try_from(n).ok())
        {
            Some(p) => p,
            None => return Ok(None),
        };

        let supplier_name = text(&document, "a.supplier-name, span.company-name");
        let brand = if retail { None } else { supplier_name.clone() };
        let image_url = attr(&document, "img.main-image, img.detail-gallery-img", "src");
        let min_order_text = text(&document, "span.min-order, span.quantity-range");
        let min_order_qty = min_order_text
            .and_then(|t| parse_locale_number(&t))
            .map(|n| n as u32)
            .unwrap_or(1);

        Ok(Some(ProductRecord {
            platform: Platform::AlibabaCn,
            external_id,
            url: url.to_string(),
            title,
            category: "Unknown".to_string(),
            brand,
            image_url,
            price,
            original_price: None,
            discount_percent: None,
            rank: None,
            reviews: 0,
            rating: 0.0,
            seller_count: min_order_qty.max(1),
            in_stock: true,
            delivery_days: None,
            buybox_owner: supplier_name,
        }))
    }

    fn parse_discovery_urls(&self, _html: &str, _category: &str) -> Vec<String> {
        Vec::new() // discovery N/A (§4.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_aliexpress_item_path() {
        let ext = AlibabaExtractor;
        assert_eq!(
            ext.extract_id("https://www.aliexpress.com/item/1005006123456789.html"),
            Some("1005006123456789".to_string())
        );
    }

    #[test]
    fn extracts_id_from_alibaba_product_detail_path() {
        let ext = AlibabaExtractor;
        assert_eq!(
            ext.extract_id("https://www.alibaba.com/product-detail/Widget_60987654321.html"),
            Some("60987654321".to_string())
        );
    }

    #[test]
    fn discovery_is_unimplemented() {
        let ext = AlibabaExtractor;
        assert!(ext.parse_discovery_urls("<html></html>", "Electronics").is_empty());
    }

    #[test]
    fn distinguishes_aliexpress_from_alibaba_hostname() {
        assert!(AlibabaExtractor::is_aliexpress("https://www.aliexpress.com/item/1.html"));
        assert!(!AlibabaExtractor::is_aliexpress("https://www.alibaba.com/product-detail/x_1.html"));
    }
}
