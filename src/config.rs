use reqwest::Url;
use std::fmt;
use std::time::Duration;

use crate::error::{Result, WaveSpeedError};

/// Default API root. Relative request paths are joined beneath it.
pub const DEFAULT_BASE_URL: &str = "https://api.wavespeed.ai/api/v3";

pub const ENV_API_KEY: &str = "WAVESPEED_API_KEY";
pub const ENV_BASE_URL: &str = "WAVESPEED_BASE_URL";
pub const ENV_POLL_INTERVAL: &str = "WAVESPEED_POLL_INTERVAL";
pub const ENV_TIMEOUT: &str = "WAVESPEED_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "WAVESPEED_MAX_RETRIES";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolved, immutable client configuration.
///
/// Every setting is resolved once at construction: an explicit builder value
/// wins, then the matching `WAVESPEED_*` environment variable, then the
/// built-in default. The API key has no default, so a missing key fails
/// here, before any request is made.
///
/// # Example
/// ```
/// use wavespeed_rs::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .with_api_key("sk-test")
///     .with_poll_interval(Duration::from_millis(500))
///     .without_env()
///     .build()
///     .unwrap();
///
/// assert_eq!(config.poll_interval(), Duration::from_millis(500));
/// assert_eq!(config.base_url().as_str(), "https://api.wavespeed.ai/api/v3/");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    api_key: String,
    base_url: Url,
    poll_interval: Duration,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("backoff_base", &self.backoff_base)
            .finish()
    }
}

impl ClientConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Config with an explicit API key; everything else from the
    /// environment or defaults.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().with_api_key(api_key).build()
    }

    /// Config resolved entirely from the environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Default per-attempt request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Default number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Resolve a request path against the base URL.
    ///
    /// The path is appended segment by segment beneath the base URL's own
    /// prefix (e.g. `/api/v3`), so it can never change the host or climb
    /// out of that prefix. A leading `/` is ignored, `.` and `..` segments
    /// are rejected, and query pairs are percent-encoded.
    pub fn endpoint_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|s| s == "." || s == "..") {
            return Err(WaveSpeedError::InvalidConfig(format!(
                "Request path {:?} must not contain '.' or '..' segments",
                path
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                WaveSpeedError::InvalidConfig(format!(
                    "Base URL {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(relative.split('/'));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

/// Builder for [`ClientConfig`].
///
/// Reads the process environment by default. Tests and embedders can swap
/// the lookup with [`with_env`](Self::with_env) or disable it entirely with
/// [`without_env`](Self::without_env).
pub struct ClientConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    poll_interval: Option<Duration>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    backoff_base: Duration,
    env: EnvLookup,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            poll_interval: None,
            timeout: None,
            max_retries: None,
            backoff_base: DEFAULT_BACKOFF_BASE,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }
}

impl ClientConfigBuilder {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Delay between status polls while waiting on a prediction.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Per-attempt request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retries after the first attempt for transient failures.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Base of the exponential backoff between retries (default 1s).
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Replace the environment lookup used for fallback values.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Ignore the environment; only explicit values and defaults apply.
    pub fn without_env(self) -> Self {
        self.with_env(|_| None)
    }

    /// Resolve every setting and validate the result.
    pub fn build(self) -> Result<ClientConfig> {
        let env = &*self.env;

        let api_key = resolve_setting(self.api_key, env, ENV_API_KEY, |_, raw| {
            Ok(raw.to_string())
        })?
        .filter(|k| !k.trim().is_empty())
        .ok_or(WaveSpeedError::MissingApiKey)?;

        let base_url = resolve_setting(self.base_url, env, ENV_BASE_URL, |_, raw| {
            Ok(raw.to_string())
        })?
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base_url)?;

        let poll_interval = resolve_setting(self.poll_interval, env, ENV_POLL_INTERVAL, parse_seconds)?
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let timeout = resolve_setting(self.timeout, env, ENV_TIMEOUT, parse_seconds)?
            .unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(WaveSpeedError::InvalidConfig(
                "Request timeout must be greater than zero".into(),
            ));
        }

        let max_retries = resolve_setting(self.max_retries, env, ENV_MAX_RETRIES, |key, raw| {
            raw.parse::<u32>().map_err(|_| {
                WaveSpeedError::InvalidConfig(format!(
                    "{} must be a non-negative integer, got {:?}",
                    key, raw
                ))
            })
        })?
        .unwrap_or(DEFAULT_MAX_RETRIES);

        Ok(ClientConfig {
            api_key,
            base_url,
            poll_interval,
            timeout,
            max_retries,
            backoff_base: self.backoff_base,
        })
    }
}

/// Layered lookup: explicit value, else parsed environment value, else `None`.
///
/// Blank environment values count as unset.
pub fn resolve_setting<T>(
    explicit: Option<T>,
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    parse: impl FnOnce(&str, &str) -> Result<T>,
) -> Result<Option<T>> {
    if explicit.is_some() {
        return Ok(explicit);
    }
    match env(key) {
        Some(raw) if !raw.trim().is_empty() => parse(key, raw.trim()).map(Some),
        _ => Ok(None),
    }
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = raw.parse().map_err(|_| {
        WaveSpeedError::InvalidConfig(format!("{} must be a number of seconds, got {:?}", key, raw))
    })?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        WaveSpeedError::InvalidConfig(format!(
            "{} must be a non-negative number of seconds, got {:?}",
            key, raw
        ))
    })
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = format!("{}/", raw.trim().trim_end_matches('/'));
    let url = Url::parse(&normalized)
        .map_err(|e| WaveSpeedError::InvalidConfig(format!("Invalid base URL {:?}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(WaveSpeedError::InvalidConfig(format!(
            "Base URL must be http or https, got {:?}",
            raw
        )));
    }
    Ok(url)
}
