use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;

use crate::error::PipelineError;
use crate::models::{AlertEvent, DailyMetric, Platform, Product, ProductRecord};

/// # NDOC
/// component: `persistence`
/// purpose: Append-only JSONL file stores for products, daily metrics, and alert events
///   (§4.9), grounded on the same line-delimited-JSON shape the rest of this codebase uses for
///   run persistence. An advisory exclusive lock (`fs2`) serializes concurrent writers across
///   processes; within one process the scheduler already sequences writes per platform.
fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    let Some(parent) = path.parent() else { return Ok(()) };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(PipelineError::from)
}

fn append_line(path: &Path, line: &str) -> Result<(), PipelineError> {
    ensure_parent_dir(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let result = file.write_all(line.as_bytes()).and_then(|_| file.write_all(b"\n"));
    let _ = file.unlock();
    result.map_err(PipelineError::from)
}

fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        items.push(serde_json::from_str(&line)?);
    }
    Ok(items)
}

#[derive(Debug, Clone)]
pub struct ProductStore {
    path: PathBuf,
}

impl ProductStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Converts `record` into a `Product`, preserving `created_at` from any prior sighting of
    /// the same (platform, external_id) and appending the (possibly unchanged) row. Only a
    /// first-ever sighting is stamped with `now`.
    pub fn upsert(&self, record: &ProductRecord, now: DateTime<Utc>) -> Result<Product, PipelineError> {
        let existing = self.find(record.platform, &record.external_id)?;
        let created_at = existing.map(|p| p.created_at).unwrap_or(now);
        let product = record.product(created_at);
        let line = serde_json::to_string(&product)?;
        append_line(&self.path, &line)?;
        Ok(product)
    }

    pub fn find(&self, platform: Platform, external_id: &str) -> Result<Option<Product>, PipelineError> {
        let products: Vec<Product> = read_lines(&self.path)?;
        Ok(products.into_iter().filter(|p| p.platform == platform && p.external_id == external_id).last())
    }

    pub fn all_latest(&self) -> Result<Vec<Product>, PipelineError> {
        let products: Vec<Product> = read_lines(&self.path)?;
        let mut latest: std::collections::HashMap<(Platform, String), Product> = std::collections::HashMap::new();
        for product in products {
            latest.insert((product.platform, product.external_id.clone()), product);
        }
        Ok(latest.into_values().collect())
    }
}

#[derive(Debug, Clone)]
pub struct MetricStore {
    path: PathBuf,
}

impl MetricStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, metric: &DailyMetric) -> Result<(), PipelineError> {
        if !metric.is_consistent() {
            return Err(PipelineError::extraction_failure(format!(
                "metric for {} {} fails invariant checks (§3), refusing to persist",
                metric.platform.as_str(),
                metric.external_id
            )));
        }
        let line = serde_json::to_string(metric)?;
        append_line(&self.path, &line)
    }

    pub fn history(&self, platform: Platform, external_id: &str) -> Result<Vec<DailyMetric>, PipelineError> {
        let metrics: Vec<DailyMetric> = read_lines(&self.path)?;
        let mut filtered: Vec<DailyMetric> = metrics.into_iter().filter(|m| m.platform == platform && m.external_id == external_id).collect();
        filtered.sort_by_key(|m| m.date);
        Ok(filtered)
    }

    /// Returns `(current, previous)` for the alert engine — the two most recent entries for
    /// this product, in chronological order.
    pub fn latest_pair(&self, platform: Platform, external_id: &str) -> Result<Option<(DailyMetric, Option<DailyMetric>)>, PipelineError> {
        let history = self.history(platform, external_id)?;
        Ok(match history.len() {
            0 => None,
            1 => Some((history[0].clone(), None)),
            n => Some((history[n - 1].clone(), Some(history[n - 2].clone()))),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AlertEventStore {
    path: PathBuf,
}

impl AlertEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, event: &AlertEvent) -> Result<(), PipelineError> {
        let line = serde_json::to_string(event)?;
        append_line(&self.path, &line)
    }

    pub fn for_user(&self, user_id: &str, subscription_user_ids: &[(&str, &str)], limit: usize) -> Result<Vec<AlertEvent>, PipelineError> {
        let events: Vec<AlertEvent> = read_lines(&self.path)?;
        let owned_subscriptions: std::collections::HashSet<&str> = subscription_user_ids
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, sub_id)| *sub_id)
            .collect();
        let mut matching: Vec<AlertEvent> = events.into_iter().filter(|e| owned_subscriptions.contains(e.subscription_id.as_str())).collect();
        matching.sort_by_key(|e| e.triggered_at);
        matching.reverse();
        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn record() -> ProductRecord {
        ProductRecord {
            platform: Platform::AmazonUs,
            external_id: "B000TEST01".to_string(),
            url: "https://www.amazon.com/dp/B000TEST01".to_string(),
            title: "Test Widget".to_string(),
            category: "Electronics".to_string(),
            brand: None,
            image_url: None,
            price: Decimal::new(2999, 2),
            original_price: None,
            discount_percent: None,
            rank: Some(1000),
            reviews: 500,
            rating: 4.5,
            seller_count: 3,
            in_stock: true,
            delivery_days: None,
            buybox_owner: None,
        }
    }

    #[test]
    fn second_upsert_preserves_original_created_at() {
        let dir = tempdir().unwrap();
        let store = ProductStore::new(dir.path().join("products.jsonl"));

        let first_seen = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z").unwrap().with_timezone(&Utc);

        let first = store.upsert(&record(), first_seen).unwrap();
        let second = store.upsert(&record(), later).unwrap();

        assert_eq!(first.created_at, first_seen);
        assert_eq!(second.created_at, first_seen);
    }

    #[test]
    fn metric_history_is_sorted_and_filtered_by_product() {
        let dir = tempdir().unwrap();
        let store = MetricStore::new(dir.path().join("metrics.jsonl"));

        let mut m = record().daily_metric(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        store.append(&m).unwrap();
        m.date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        store.append(&m).unwrap();

        let history = store.history(Platform::AmazonUs, "B000TEST01").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].date < history[1].date);
    }

    #[test]
    fn append_rejects_a_metric_that_fails_its_own_invariants() {
        let dir = tempdir().unwrap();
        let store = MetricStore::new(dir.path().join("metrics.jsonl"));

        let mut m = record().daily_metric(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        m.rating = 9.0; // out of [0, 5]

        assert!(store.append(&m).is_err());
        assert!(store.history(Platform::AmazonUs, "B000TEST01").unwrap().is_empty());
    }

    #[test]
    fn latest_pair_returns_two_most_recent_in_order() {
        let dir = tempdir().unwrap();
        let store = MetricStore::new(dir.path().join("metrics.jsonl"));
        for day in 1..=3u32 {
            let mut m = record().daily_metric(NaiveDate::from_ymd_opt(2026, 1, day).unwrap());
            m.price = Decimal::new(2999 - day as i64, 2);
            store.append(&m).unwrap();
        }

        let (current, previous) = store.latest_pair(Platform::AmazonUs, "B000TEST01").unwrap().unwrap();
        assert_eq!(current.date, NaiveDate::from_ymd_opt(2026, 1, 3).unwrap());
        assert_eq!(previous.unwrap().date, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }
}
