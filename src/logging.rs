use log::kv::{self, Key, Value, Visitor};
use log::{Log, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;

// --- Thread-local job context storage ---

thread_local! {
    static CURRENT_JOB_CONTEXT: RefCell<Option<String>> = RefCell::new(None);
}

/// Sets the current scheduler job context (e.g. "amazon_us:discovery") for the calling thread.
pub fn set_current_job_context(context: String) {
    CURRENT_JOB_CONTEXT.with(|cell| {
        *cell.borrow_mut() = Some(context);
    });
}

/// Clears the current job context for the calling thread.
pub fn clear_current_job_context() {
    CURRENT_JOB_CONTEXT.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

// --- Log Record Structure for JSON output ---

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogRecord {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    pub job_context: Option<String>,
    pub name: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// --- Custom Logger Implementation ---

struct JsonLogger;

/// Helper to collect key-value pairs from `log::kv::Source`.
struct KeyValueCollector<'a>(&'a mut HashMap<String, serde_json::Value>);

impl<'a> Visitor<'a> for KeyValueCollector<'a> {
    fn visit_pair(&mut self, key: Key<'a>, value: Value<'a>) -> Result<(), kv::Error> {
        self.0
            .insert(key.as_str().to_string(), json!(value.to_string()));
        Ok(())
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let job_context = CURRENT_JOB_CONTEXT.with(|cell| cell.borrow().clone());

        let mut extra_fields = HashMap::new();
        let mut collector = KeyValueCollector(&mut extra_fields);
        if let Err(e) = record.key_values().visit(&mut collector) {
            eprintln!("error visiting log key-value pairs: {:?}", e);
        }

        let log_record = JsonLogRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: record.level().to_string(),
            message: format!("{}", record.args()),
            job_context,
            name: record.target().to_string(),
            module_path: record.module_path().map(|s| s.to_string()),
            file: record.file().map(|s| s.to_string()),
            line: record.line(),
            extra: extra_fields,
        };

        println!(
            "{}",
            serde_json::to_string(&log_record).expect("failed to serialize log record to JSON")
        );
    }

    fn flush(&self) {}
}

static LOGGER: JsonLogger = JsonLogger;
static INIT_LOGGER_ONCE: OnceCell<()> = OnceCell::new();

/// Initializes the custom JSON logger. Call once at process start.
pub fn init_logger() -> Result<(), SetLoggerError> {
    INIT_LOGGER_ONCE
        .get_or_try_init(|| {
            log::set_logger(&LOGGER)?;
            log::set_max_level(log::LevelFilter::Info);
            Ok(())
        })
        .map(|_| ())
}

/// Logs a single fetch attempt outcome from the anti-blocking substrate.
pub fn log_fetch_outcome(platform: &str, url: &str, outcome: &str) {
    log::info!(
        target: platform,
        url = url,
        outcome = outcome;
        "fetch outcome"
    );
}

/// Logs a dispatched alert send.
pub fn log_alert_dispatch(subscription_id: &str, channel: &str, success: bool) {
    log::info!(
        target: "alerts",
        subscription_id = subscription_id,
        channel = channel,
        success = success;
        "alert dispatched"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::info;

    #[test]
    fn logger_initializes_idempotently() {
        let _ = init_logger();
        let _ = init_logger();

        set_current_job_context("amazon_us:discovery".to_string());
        info!(target: "scheduler", "job started");
        log_fetch_outcome("amazon_us", "https://www.amazon.com/dp/B000", "success");
        log_alert_dispatch("sub-1", "webhook", true);
        clear_current_job_context();
        info!(target: "scheduler", "no context after clear");
    }
}
