use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "VetRecords";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default REST API location when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3333";

/// Name of the cookie carrying the bearer token.
pub const DEFAULT_TOKEN_COOKIE: &str = "token";

const ENV_API_URL: &str = "VET_RECORDS_API_URL";
const ENV_COOKIE_FILE: &str = "VET_RECORDS_COOKIE_FILE";
const ENV_TOKEN_COOKIE: &str = "VET_RECORDS_TOKEN_COOKIE";
const ENV_TIMEOUT_SECS: &str = "VET_RECORDS_TIMEOUT_SECS";

/// Default tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "vet_records=info,warn"
}

/// Get the application data directory.
/// `~/VetRecords/` when a home directory exists, `./VetRecords` otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the session cookie file.
pub fn default_cookie_file() -> PathBuf {
    app_data_dir().join("session.cookie")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Client configuration: where the REST API lives and where the session is read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash.
    pub base_url: String,
    /// File holding the browser-style cookie string (`name=value; other=...`).
    pub cookie_file: PathBuf,
    /// Cookie name that carries the bearer token.
    pub token_cookie: String,
    /// Request timeout. `None` keeps the HTTP client defaults.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            cookie_file: default_cookie_file(),
            token_cookie: DEFAULT_TOKEN_COOKIE.to_string(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Config pointing at a specific API, other values default.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            let url = url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    var: ENV_API_URL,
                    value: url.to_string(),
                });
            }
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup(ENV_COOKIE_FILE).filter(|v| !v.trim().is_empty()) {
            config.cookie_file = PathBuf::from(path);
        }
        if let Some(name) = lookup(ENV_TOKEN_COOKIE).filter(|v| !v.trim().is_empty()) {
            config.token_cookie = name.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}
