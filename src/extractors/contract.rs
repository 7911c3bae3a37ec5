use crate::error::PipelineError;
use crate::models::{Platform, ProductRecord};

/// # NDOC
/// component: `extractors::contract`
/// purpose: Shared contract every platform extractor implements (§4.2).
/// invariants:
///   - `extract_id` is a pure regex over URL shape; it performs no I/O.
///   - `scrape_product` parses already-rendered HTML; it never fabricates a missing title or
///     price — both are fatal for the record (§4.2 Failure semantics).
///   - `list_discovery_urls` returns at most 100 URLs.
pub trait PlatformExtractor {
    fn platform(&self) -> Platform;

    /// Pure regex over URL shape; no I/O.
    fn extract_id(&self, url: &str) -> Option<String>;

    /// URL claim for the platform dispatcher.
    fn detect(&self, url: &str) -> bool {
        self.extract_id(url).is_some()
    }

    /// Parses already-rendered HTML for `url` into a normalized `ProductRecord`.
    /// Returns `Ok(None)` (not an error) for a clean "this isn't a product" miss,
    /// and `Err` for a fetch/block-detection failure that should count against the breaker.
    fn parse_product(&self, url: &str, html: &str) -> Result<Option<ProductRecord>, PipelineError>;

    /// Extracts candidate product URLs from a rendered discovery (bestsellers / category /
    /// search) page, bounded to at most 100.
    fn parse_discovery_urls(&self, html: &str, category: &str) -> Vec<String>;

    /// Sentinel strings that indicate a CAPTCHA / anti-bot block page for this platform.
    fn block_sentinels(&self) -> &'static [&'static str];

    fn is_blocked(&self, html: &str) -> bool {
        let lower = html.to_lowercase();
        self.block_sentinels()
            .iter()
            .any(|sentinel| lower.contains(&sentinel.to_lowercase()))
    }
}

/// Parses a decimal-looking numeric string into `f64`, stripping currency symbols, thousands
/// separators (comma or Indian-style grouping), and surrounding whitespace. Platform extractors
/// tolerate locale formatting per §9 Design Notes; this is the single shared implementation.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_number() {
        assert_eq!(parse_locale_number("29.99"), Some(29.99));
    }

    #[test]
    fn strips_currency_symbol_and_comma() {
        assert_eq!(parse_locale_number("$1,299.00"), Some(1299.00));
    }

    #[test]
    fn strips_rupee_symbol_and_indian_grouping() {
        assert_eq!(parse_locale_number("\u{20b9}1,23,456"), Some(123456.0));
    }

    #[test]
    fn empty_input_is_none() {
        assert_eq!(parse_locale_number("N/A"), None);
    }
}
