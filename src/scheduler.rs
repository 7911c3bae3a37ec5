use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use log::{error, info, warn};
use tokio::task::JoinSet;

use crate::alerts::AlertEngine;
use crate::antiblock::retry::fetch_with_retry;
use crate::antiblock::AntiBlockingSubstrate;
use crate::error::PipelineError;
use crate::extractors::shopify::ShopifyExtractor;
use crate::extractors::{self, PlatformExtractor};
use crate::models::{AlertSubscription, Platform, ProductRecord};
use crate::persistence::{AlertEventStore, MetricStore, ProductStore};

/// # NDOC
/// component: `scheduler`
/// purpose: Owns the per-platform job timers (§5/§6): discovery runs on a fixed interval per
///   platform, metrics collection runs once daily at a fixed UTC time. Platforms are scheduled
///   concurrently against each other; all extractor calls for one platform happen sequentially
///   so the shared rate limiter and circuit breaker see one caller at a time per platform.
/// invariants:
///   - Every product write is its own transaction boundary (§5 Cancellation/timeouts): a
///     cancelled job loses at most the one product in flight.
///   - No component here reaches for `Utc::now()` to decide *whether* to run outside of
///     `next_daily_run_at`/the live `run_forever` loop; the one-shot job bodies take an explicit
///     `now` so their ordering and persistence effects stay testable.
const DISCOVERY_LIMIT_PER_CATEGORY_DEFAULT: usize = 30;
const DISCOVERY_LIMIT_PER_CATEGORY_OTHER: usize = 20;

/// (platform, interval, offset) — discovery cadence (§6). Offset staggers platforms that share
/// an interval so they don't all fetch in the same instant.
const DISCOVERY_CADENCE: &[(Platform, Duration, Duration)] = &[
    (Platform::AmazonUs, Duration::from_secs(6 * 3600), Duration::ZERO),
    (Platform::FlipkartIn, Duration::from_secs(6 * 3600), Duration::from_secs(3600)),
    (Platform::EbayUs, Duration::from_secs(12 * 3600), Duration::ZERO),
    (Platform::WalmartUs, Duration::from_secs(12 * 3600), Duration::from_secs(6 * 3600)),
];

/// Daily metrics collection time-of-day UTC (§6). Alibaba and Shopify have no discovery cadence
/// of their own; their metrics window rides on eBay's since the cadence table names no slot for
/// either and both carry the lowest collection priority.
fn metrics_time_for(platform: Platform) -> NaiveTime {
    match platform {
        Platform::AmazonUs => NaiveTime::from_hms_opt(3, 0, 0).expect("valid time"),
        Platform::FlipkartIn => NaiveTime::from_hms_opt(4, 0, 0).expect("valid time"),
        Platform::EbayUs | Platform::AlibabaCn | Platform::Shopify => NaiveTime::from_hms_opt(5, 0, 0).expect("valid time"),
        Platform::WalmartUs => NaiveTime::from_hms_opt(6, 0, 0).expect("valid time"),
    }
}

fn discovery_limit(platform: Platform) -> usize {
    match platform {
        Platform::AmazonUs | Platform::FlipkartIn => DISCOVERY_LIMIT_PER_CATEGORY_DEFAULT,
        _ => DISCOVERY_LIMIT_PER_CATEGORY_OTHER,
    }
}

/// Static per-platform category seeds (§6: "Category lists are static per platform"). Alibaba
/// has no discovery cadence at all (§4.2), so it carries no category list here.
fn categories_for(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::AmazonUs => &["electronics", "home-kitchen", "toys-games"],
        Platform::FlipkartIn => &["electronics", "fashion", "home-furniture"],
        Platform::WalmartUs => &["electronics", "home"],
        Platform::EbayUs => &["electronics", "collectibles"],
        Platform::Shopify => &[],
        Platform::AlibabaCn => &[],
    }
}

/// Fetches and renders an arbitrary URL into HTML. Kept as a narrow trait so the scheduler
/// doesn't hard-code a specific rendering backend; §4.1 calls for full JS execution via a
/// headless browser, which a production `PageRenderer` impl would provide.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, user_agent: &str) -> Result<String, PipelineError>;
}

/// Plain HTTP GET renderer. Does not execute JavaScript; suitable for platforms whose product
/// and discovery pages are server-rendered, and as the fallback when no browser-driven renderer
/// is wired in.
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str, user_agent: &str) -> Result<String, PipelineError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", user_agent)
            .send()
            .await
            .map_err(PipelineError::from)?;
        response.text().await.map_err(PipelineError::from)
    }
}

/// Everything a scheduler run needs, constructed once at process start and shared across every
/// platform's job task via `Arc` (§5 Shared mutable state / §9 explicit dependencies, no
/// statics).
pub struct Scheduler {
    substrate: Arc<AntiBlockingSubstrate>,
    renderer: Arc<dyn PageRenderer>,
    products: Arc<ProductStore>,
    metrics: Arc<MetricStore>,
    alert_events: Arc<AlertEventStore>,
    alert_engine: Arc<AlertEngine>,
}

impl Scheduler {
    pub fn new(
        substrate: Arc<AntiBlockingSubstrate>,
        renderer: Arc<dyn PageRenderer>,
        products: Arc<ProductStore>,
        metrics: Arc<MetricStore>,
        alert_events: Arc<AlertEventStore>,
        alert_engine: Arc<AlertEngine>,
    ) -> Self {
        Self { substrate, renderer, products, metrics, alert_events, alert_engine }
    }

    /// Runs one discovery pass for `platform`: sequentially walks its static category list,
    /// fetching the seed page, parsing candidate product URLs (bounded per §4.2), then
    /// sequentially fetching and persisting each product. Returns every record successfully
    /// committed; a single product's failure does not abort the rest (§5 transaction boundary).
    pub async fn run_discovery_job(&self, platform: Platform, now: DateTime<Utc>) -> Vec<ProductRecord> {
        let extractor = extractors::extractor_for(platform);
        let limit = discovery_limit(platform);
        let mut collected = Vec::new();

        for category in categories_for(platform) {
            let urls = match self.discover_urls(platform, extractor.as_ref(), category, limit).await {
                Ok(urls) => urls,
                Err(err) => {
                    warn!(target: "scheduler", "discovery seed fetch failed for {} / {category}: {err}", platform.as_str());
                    continue;
                }
            };

            for url in urls {
                match self.fetch_and_persist_product(platform, extractor.as_ref(), &url, now).await {
                    Ok(Some(record)) => collected.push(record),
                    Ok(None) => {}
                    Err(err) => warn!(target: "scheduler", "product fetch failed for {url}: {err}"),
                }
            }
        }

        collected
    }

    async fn discover_urls(
        &self,
        platform: Platform,
        extractor: &dyn PlatformExtractor,
        category: &str,
        limit: usize,
    ) -> Result<Vec<String>, PipelineError> {
        let ticket = self.substrate.acquire_fetch_slot(platform).await?;
        let seed_url = format!("https://example-seed.invalid/{}/{category}", platform.as_str());
        // FetchTimeout/NetworkError are retried here, before the outcome counts against the
        // breaker (§4.1); BlockDetected and other non-transient kinds never reach this point.
        let html = fetch_with_retry(|| self.renderer.render(&seed_url, ticket.fingerprint.user_agent)).await;
        match html {
            Ok(html) => {
                self.substrate.report_outcome(platform, true);
                let mut urls = extractor.parse_discovery_urls(&html, category);
                urls.truncate(limit.min(urls.len()));
                Ok(urls)
            }
            Err(err) => {
                self.substrate.report_outcome(platform, false);
                Err(err)
            }
        }
    }

    /// Runs the daily metrics-collection job for a set of already-known products on `platform`:
    /// re-fetches each, appends the new `DailyMetric`, and evaluates `subscriptions` against the
    /// resulting (current, previous) pair, dispatching any alerts that fire.
    pub async fn run_metrics_job(
        &self,
        platform: Platform,
        external_ids: &[String],
        subscriptions: &[AlertSubscription],
        now: DateTime<Utc>,
    ) -> usize {
        let extractor = extractors::extractor_for(platform);
        let mut events_fired = 0;

        for external_id in external_ids {
            let url = match self.products.find(platform, external_id) {
                Ok(Some(product)) => product.url,
                _ => continue,
            };

            let record = match self.fetch_and_persist_product(platform, extractor.as_ref(), &url, now).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => {
                    warn!(target: "scheduler", "metrics fetch failed for {url}: {err}");
                    continue;
                }
            };

            let Ok(Some((current, previous))) = self.metrics.latest_pair(platform, &record.external_id) else { continue };

            let relevant: Vec<AlertSubscription> = subscriptions
                .iter()
                .filter(|s| s.platform == platform && s.product_external_id.as_deref() == Some(external_id.as_str()))
                .cloned()
                .collect();

            let events = self.alert_engine.process_product_metrics(&relevant, &current, previous.as_ref(), now).await;
            for event in &events {
                if let Err(err) = self.alert_events.append(event) {
                    error!(target: "scheduler", "failed to persist alert event {}: {err}", event.id);
                }
            }
            events_fired += events.len();
        }

        events_fired
    }

    async fn fetch_and_persist_product(
        &self,
        platform: Platform,
        extractor: &dyn PlatformExtractor,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ProductRecord>, PipelineError> {
        let ticket = self.substrate.acquire_fetch_slot(platform).await?;

        if platform == Platform::Shopify {
            if let Some(record) = self.fetch_shopify_json(url, ticket.fingerprint.user_agent).await {
                self.substrate.report_outcome(platform, true);
                return self.persist(record, now);
            }
        }

        let html = fetch_with_retry(|| self.renderer.render(url, ticket.fingerprint.user_agent)).await;

        let html = match html {
            Ok(html) => html,
            Err(err) => {
                self.substrate.report_outcome(platform, false);
                return Err(err);
            }
        };

        if extractor.is_blocked(&html) {
            self.substrate.report_outcome(platform, false);
            return Err(PipelineError::block_detected(platform.as_str()));
        }

        let parsed = extractor.parse_product(url, &html);
        match parsed {
            Ok(Some(record)) => {
                self.substrate.report_outcome(platform, true);
                self.persist(record, now)
            }
            Ok(None) => {
                self.substrate.report_outcome(platform, true);
                Ok(None)
            }
            Err(err) => {
                self.substrate.report_outcome(platform, false);
                Err(err)
            }
        }
    }

    /// Tries the `products/{handle}.json` endpoint Shopify stores expose by default (§4.2:
    /// "Prefer the JSON endpoint... fall back to DOM on 404/non-JSON"). Returns `None` on any
    /// fetch failure or unparseable body so the caller falls through to the DOM path on the same
    /// fetch slot; the DOM attempt reports its own outcome to the breaker.
    async fn fetch_shopify_json(&self, url: &str, user_agent: &'static str) -> Option<ProductRecord> {
        let json_url = if url.ends_with(".json") { url.to_string() } else { format!("{url}.json") };
        let body = fetch_with_retry(|| self.renderer.render(&json_url, user_agent)).await.ok()?;
        ShopifyExtractor::parse_product_json(url, &body)
    }

    fn persist(&self, record: ProductRecord, now: DateTime<Utc>) -> Result<Option<ProductRecord>, PipelineError> {
        let product = self.products.upsert(&record, now)?;
        let metric = record.daily_metric(now.date_naive());
        self.metrics.append(&metric)?;
        info!(target: "scheduler", "persisted {} ({})", product.external_id, record.platform.as_str());
        Ok(Some(record))
    }

    /// Launches every platform's discovery job concurrently and waits for all to finish. Each
    /// platform's own work inside `run_discovery_job` stays sequential (§5). Takes `scheduler`
    /// by `&Arc<Self>` rather than as a receiver so it can be cloned once per spawned task.
    pub async fn run_all_discovery_jobs(scheduler: &Arc<Self>, now: DateTime<Utc>) -> Vec<ProductRecord> {
        let mut joins = JoinSet::new();
        for (platform, _, _) in DISCOVERY_CADENCE {
            let scheduler = Arc::clone(scheduler);
            let platform = *platform;
            joins.spawn(async move { scheduler.run_discovery_job(platform, now).await });
        }

        let mut all = Vec::new();
        while let Some(result) = joins.join_next().await {
            match result {
                Ok(records) => all.extend(records),
                Err(err) => error!(target: "scheduler", "discovery task panicked: {err}"),
            }
        }
        all
    }

    /// Spawns one long-lived task per `DISCOVERY_CADENCE` entry, each sleeping `offset` once
    /// and then firing `run_discovery_job` on `interval` forever. Intended for the process's
    /// main loop; job bodies are exercised directly in tests instead, so this never needs to
    /// run in a test and has no return value to assert on.
    pub fn spawn_discovery_timers(scheduler: &Arc<Self>) {
        for &(platform, interval, offset) in DISCOVERY_CADENCE {
            let scheduler = Arc::clone(scheduler);
            tokio::spawn(async move {
                if !offset.is_zero() {
                    tokio::time::sleep(offset).await;
                }
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    scheduler.run_discovery_job(platform, Utc::now()).await;
                }
            });
        }
    }
}

/// Duration until the next occurrence of `time_of_day` UTC, strictly after `now`. Used by the
/// live scheduling loop (not exercised in tests, which drive job bodies directly with a fixed
/// `now`).
pub fn duration_until_next(now: DateTime<Utc>, time_of_day: NaiveTime) -> Duration {
    let today_at_time = now.date_naive().and_time(time_of_day).and_utc();
    let next = if today_at_time > now { today_at_time } else { today_at_time + chrono::Duration::days(1) };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
