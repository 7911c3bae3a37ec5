use std::env;

/// # NDOC
/// component: `config`
/// purpose: Process-wide settings loaded once from the environment.
/// invariants:
///   - Constructed exactly once at process start and passed down as an explicit dependency
///     (scheduler, anti-blocking substrate, alert channels); never read from global statics.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub proxy_url: Option<String>,
    pub user_agent: String,
    pub scrape_delay_min_secs: f64,
    pub scrape_delay_max_secs: f64,
    pub scraper_api_key: Option<String>,
    pub bright_data_user: Option<String>,
    pub bright_data_pass: Option<String>,
    pub mcp_server_name: String,
    pub mcp_server_version: String,
    pub environment: String,
    pub debug: bool,
}

impl Config {
    /// Loads `.env` (if present) then reads the environment. Missing optional values fall
    /// back to the defaults below; `database_url` has no default because persistence has
    /// nowhere sane to point without one.
    pub fn load() -> Self {
        let _ = dotenv::dotenv();

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/retail_intel".to_string()),
            redis_url: env::var("REDIS_URL").ok(),
            proxy_url: env::var("PROXY_URL").ok(),
            user_agent: env::var("USER_AGENT").unwrap_or_else(|_| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
            }),
            scrape_delay_min_secs: parse_env_f64("SCRAPE_DELAY_MIN", 2.0),
            scrape_delay_max_secs: parse_env_f64("SCRAPE_DELAY_MAX", 5.0),
            scraper_api_key: env::var("SCRAPER_API_KEY").ok(),
            bright_data_user: env::var("BRIGHT_DATA_USER").ok(),
            bright_data_pass: env::var("BRIGHT_DATA_PASS").ok(),
            mcp_server_name: env::var("MCP_SERVER_NAME")
                .unwrap_or_else(|_| "retail-intel-core".to_string()),
            mcp_server_version: env::var("MCP_SERVER_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            debug: parse_env_bool("DEBUG", false),
        }
    }

    /// §4.1's operating-mode gate: presence of paid-proxy credentials flips the anti-blocking
    /// substrate from the free (N=5, F=3, 300s) parameter set to the paid one (N=30, F=5, 120s).
    pub fn paid_proxy_mode(&self) -> bool {
        self.scraper_api_key.is_some()
            || (self.bright_data_user.is_some() && self.bright_data_pass.is_some())
    }
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_proxy_mode_detects_scraper_api_key() {
        let mut cfg = bare_config();
        cfg.scraper_api_key = Some("key".to_string());
        assert!(cfg.paid_proxy_mode());
    }

    #[test]
    fn paid_proxy_mode_requires_both_bright_data_fields() {
        let mut cfg = bare_config();
        cfg.bright_data_user = Some("user".to_string());
        assert!(!cfg.paid_proxy_mode());
        cfg.bright_data_pass = Some("pass".to_string());
        assert!(cfg.paid_proxy_mode());
    }

    fn bare_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".to_string(),
            redis_url: None,
            proxy_url: None,
            user_agent: "test-agent".to_string(),
            scrape_delay_min_secs: 2.0,
            scrape_delay_max_secs: 5.0,
            scraper_api_key: None,
            bright_data_user: None,
            bright_data_pass: None,
            mcp_server_name: "retail-intel-core".to_string(),
            mcp_server_version: "0.0.0".to_string(),
            environment: "test".to_string(),
            debug: false,
        }
    }
}
