use rand::seq::SliceRandom;
use rand::Rng;

/// # NDOC
/// component: `antiblock::fingerprint`
/// purpose: Per-fetch browser fingerprint, drawn independently and uniformly at random from
///   curated pools, so consecutive fetches don't repeat an identifiable signature.
/// invariants:
///   - User-agent pool has >=6 entries, viewport pool >=5, locale pool >=4 (per §4.1).
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: &'static str,
    pub viewport: (u32, u32),
    pub locale: &'static str,
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 11.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
];

const VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1366, 768),
    (1536, 864),
    (1440, 900),
    (1280, 720),
    (2560, 1440),
];

const LOCALES: &[&str] = &["en-US", "en-GB", "en-IN", "de-DE", "fr-FR"];

/// JS injected before any page script runs; masks properties that commonly expose a headless
/// automation context. Kept as a single string constant so it is easy to diff against upstream
/// browser changes.
pub const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) => (
    parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : originalQuery(parameters)
);
"#;

impl Fingerprint {
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            user_agent: USER_AGENTS.choose(rng).expect("user agent pool is non-empty"),
            viewport: *VIEWPORTS.choose(rng).expect("viewport pool is non-empty"),
            locale: LOCALES.choose(rng).expect("locale pool is non-empty"),
        }
    }
}
