use serde::{Deserialize, Serialize};
use serde_json::Value;

/// # NDOC
/// component: `error`
/// purpose: Standard result alias for the pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// # NDOC
/// component: `error`
/// purpose: Stable machine-readable error category for the scraping/intelligence pipeline.
/// invariants:
///   - Variants mirror the taxonomy fixed by the design; additions require updating callers
///     that match exhaustively on `retryable()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipelineErrorKind {
    ExtractionFailure,
    BlockDetected,
    CircuitOpen,
    FetchTimeout,
    NetworkError,
    UnknownPlatform,
    InvalidUrl,
    ChannelSendFailure,
    ConfigurationError,
}

/// # NDOC
/// component: `error`
/// purpose: Canonical error payload threaded across extractors, the anti-blocking substrate,
///   the arbitrage FX resolver, and alert channels.
/// invariants:
///   - `message` is safe to surface at an API boundary.
///   - `retryable` tells a caller whether `fetch_with_retry` should attempt again.
///   - `DataInsufficient` from the error taxonomy has deliberately no variant here: signal
///     calculators never raise on legal-but-uninformative input, they return a neutral score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineError {
    pub kind: PipelineErrorKind,
    pub message: String,
    pub retryable: bool,
    pub details: Option<Value>,
}

impl PipelineError {
    pub fn new(
        kind: PipelineErrorKind,
        message: impl Into<String>,
        retryable: bool,
        details: Option<Value>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            details,
        }
    }

    pub fn extraction_failure(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::ExtractionFailure, message, false, None)
    }

    pub fn block_detected(platform: impl Into<String>) -> Self {
        let platform = platform.into();
        Self::new(
            PipelineErrorKind::BlockDetected,
            format!("block page detected on {platform}"),
            false,
            Some(serde_json::json!({ "platform": platform })),
        )
    }

    pub fn circuit_open(platform: impl Into<String>) -> Self {
        let platform = platform.into();
        Self::new(
            PipelineErrorKind::CircuitOpen,
            format!("circuit breaker open for {platform}"),
            false,
            Some(serde_json::json!({ "platform": platform })),
        )
    }

    pub fn fetch_timeout(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::FetchTimeout, message, true, None)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::NetworkError, message, true, None)
    }

    pub fn unknown_platform(url: impl Into<String>) -> Self {
        Self::new(
            PipelineErrorKind::UnknownPlatform,
            format!("no extractor claims this URL: {}", url.into()),
            false,
            None,
        )
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::InvalidUrl, message, false, None)
    }

    pub fn channel_send_failure(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::ChannelSendFailure, message, false, None)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::ConfigurationError, message, false, None)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        PipelineError::new(PipelineErrorKind::NetworkError, value.to_string(), true, None)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        PipelineError::extraction_failure(value.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            PipelineError::fetch_timeout(value.to_string())
        } else {
            PipelineError::network(value.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_open_is_not_retryable_and_carries_platform() {
        let err = PipelineError::circuit_open("amazon_us");
        assert_eq!(err.kind, PipelineErrorKind::CircuitOpen);
        assert!(!err.retryable);
        assert_eq!(err.details.unwrap()["platform"], "amazon_us");
    }

    #[test]
    fn fetch_timeout_is_retryable() {
        let err = PipelineError::fetch_timeout("render timed out");
        assert!(err.retryable);
    }
}
