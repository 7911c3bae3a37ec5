pub mod alibaba;
pub mod amazon;
pub mod contract;
pub mod ebay;
pub mod flipkart;
pub mod shopify;
pub mod walmart;

pub use contract::{parse_locale_number, PlatformExtractor};

use crate::models::Platform;

/// Returns the extractor for a known platform. Construction is cheap (all extractors are
/// zero-sized), so callers can request a fresh one per call rather than caching a `dyn` table.
pub fn extractor_for(platform: Platform) -> Box<dyn PlatformExtractor> {
    match platform {
        Platform::AmazonUs => Box::new(amazon::AmazonExtractor),
        Platform::FlipkartIn => Box::new(flipkart::FlipkartExtractor),
        Platform::WalmartUs => Box::new(walmart::WalmartExtractor),
        Platform::AlibabaCn => Box::new(alibaba::AlibabaExtractor),
        Platform::EbayUs => Box::new(ebay::EbayExtractor),
        Platform::Shopify => Box::new(shopify::ShopifyExtractor),
    }
}

/// Tries every extractor's URL claim in turn and returns the first platform that recognizes
/// the URL shape. Used by the discovery scheduler when a URL's platform isn't already known.
pub fn detect_platform(url: &str) -> Option<Platform> {
    const ALL: [Platform; 6] = [
        Platform::AmazonUs,
        Platform::FlipkartIn,
        Platform::WalmartUs,
        Platform::AlibabaCn,
        Platform::EbayUs,
        Platform::Shopify,
    ];
    ALL.into_iter().find(|&p| extractor_for(p).detect(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_amazon_from_dp_url() {
        assert_eq!(detect_platform("https://www.amazon.com/dp/B08N5WRWNW"), Some(Platform::AmazonUs));
    }

    #[test]
    fn detects_ebay_from_itm_url() {
        assert_eq!(detect_platform("https://www.ebay.com/itm/123456789012"), Some(Platform::EbayUs));
    }

    #[test]
    fn unrecognized_url_yields_no_platform() {
        assert_eq!(detect_platform("https://example.com/not-a-product"), None);
    }

    #[test]
    fn extractor_for_returns_matching_platform() {
        assert_eq!(extractor_for(Platform::Shopify).platform(), Platform::Shopify);
    }
}
