use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Bhasha";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend used when `BHASHA_API_BASE` is not set.
pub const DEFAULT_API_BASE: &str = "http://localhost:8080";

/// User id sent with every request when `BHASHA_USER_ID` is not set.
pub const DEFAULT_USER_ID: &str = "demo-user-123";

/// Per-request HTTP timeout when `BHASHA_HTTP_TIMEOUT_SECS` is not set.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Get the application data directory
/// ~/Bhasha/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Directory holding the JSON records of the local store.
pub fn store_dir() -> PathBuf {
    app_data_dir().join("store")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "bhasha_lib=info,bhasha=info,warn"
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_id: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: &str, user_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Read `BHASHA_API_BASE`, `BHASHA_USER_ID` and `BHASHA_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = lookup("BHASHA_API_BASE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let user = lookup("BHASHA_USER_ID")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        let mut config = Self::new(&base, &user);
        if let Some(raw) = lookup("BHASHA_HTTP_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %raw, "Ignoring invalid BHASHA_HTTP_TIMEOUT_SECS"),
            }
        }
        config
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_USER_ID)
    }
}
