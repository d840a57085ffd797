//! Resilient request primitive shared by every API call.
//!
//! Each attempt runs under its own deadline. Rate limiting (429), server
//! errors on `GET`, timeouts and connection failures are retried with
//! exponential backoff and jitter; anything else is handed straight back.

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::WaveSpeed;
use crate::error::{Result, WaveSpeedError};

/// Payload of a request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// JSON document, sent with `content-type: application/json`.
    Json(Value),
    /// Single-file multipart form. The encoder sets its own content-type.
    Upload {
        field: String,
        filename: String,
        bytes: Vec<u8>,
    },
}

/// Per-call options for [`WaveSpeed::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<RequestBody>,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    /// Overrides the client's per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Overrides the client's retry budget.
    pub max_retries: Option<u32>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
            timeout: None,
            max_retries: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post_json(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(RequestBody::Json(body)),
            ..Self::default()
        }
    }

    pub fn upload(
        field: impl Into<String>,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            method: Method::POST,
            body: Some(RequestBody::Upload {
                field: field.into(),
                filename: filename.into(),
                bytes,
            }),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: Option<u32>) -> Self {
        self.max_retries = retries;
        self
    }

    fn is_upload(&self) -> bool {
        matches!(self.body, Some(RequestBody::Upload { .. }))
    }
}

/// Whether a response status is worth another attempt for this method.
///
/// 429 is retried for every method. 5xx is only retried for `GET`, since
/// repeating a `POST` could submit the same job twice.
pub fn is_retryable_status(method: &Method, status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || (status.is_server_error() && *method == Method::GET)
}

/// Whether a transport error is transient.
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Delay before retry `attempt` (0-based): `base * 2^attempt` plus jitter
/// drawn uniformly from `[0, base * 2^attempt / 2)`.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let backoff_ms = (base.as_millis() as u64).saturating_mul(factor);
    let max_jitter = backoff_ms / 2;
    let jitter = if max_jitter > 0 {
        rand::rng().random_range(0..max_jitter)
    } else {
        0
    };
    Duration::from_millis(backoff_ms.saturating_add(jitter))
}

impl WaveSpeed {
    /// Send a request to `path` (relative to the base URL) with timeout,
    /// retry and backoff.
    ///
    /// Non-retryable statuses, including errors like 400 or a `POST` 503,
    /// come back as `Ok(response)` for the caller to inspect. Once the retry
    /// budget is spent the last response is returned, or the last transport
    /// failure is surfaced as [`WaveSpeedError::Timeout`] or
    /// [`WaveSpeedError::Network`].
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Response> {
        let url = self.config.endpoint_url(path, &options.query)?;
        let timeout = options.timeout.unwrap_or(self.config.timeout());
        if timeout.is_zero() {
            return Err(WaveSpeedError::InvalidConfig(
                "Request timeout must be greater than zero".into(),
            ));
        }
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries());

        let mut attempt: u32 = 0;
        loop {
            let builder = self.build_request(url.clone(), &options)?;
            debug!(
                method = %options.method,
                url = %url,
                attempt = attempt + 1,
                max_attempts = max_retries.saturating_add(1),
                "sending request"
            );

            // The timeout future owns the deadline; it is dropped on every
            // exit from this match, cancelling the in-flight send with it.
            let reason = match tokio::time::timeout(timeout, builder.send()).await {
                Ok(Ok(resp)) => {
                    let status = resp.status();
                    if attempt >= max_retries || !is_retryable_status(&options.method, status) {
                        return Ok(resp);
                    }
                    format!("HTTP {}", status.as_u16())
                }
                Ok(Err(e)) => {
                    if attempt >= max_retries || !is_retryable_error(&e) {
                        return Err(WaveSpeedError::Network {
                            context: format!("{} {} failed", options.method, url),
                            source: e,
                        });
                    }
                    e.to_string()
                }
                Err(_) => {
                    if attempt >= max_retries {
                        return Err(WaveSpeedError::Timeout(timeout));
                    }
                    format!("timed out after {:?}", timeout)
                }
            };

            let delay = backoff_delay(attempt, self.config.backoff_base());
            warn!(
                method = %options.method,
                url = %url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying after {}",
                reason
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn build_request(&self, url: Url, options: &RequestOptions) -> Result<RequestBuilder> {
        let mut builder = self
            .http
            .request(options.method.clone(), url)
            .bearer_auth(self.config.api_key());

        if !options.is_upload() {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        builder = match &options.body {
            Some(RequestBody::Json(value)) => builder.body(serde_json::to_vec(value)?),
            // Forms are consumed by send, so each attempt builds a fresh one.
            Some(RequestBody::Upload {
                field,
                filename,
                bytes,
            }) => {
                let part = Part::bytes(bytes.clone()).file_name(filename.clone());
                builder.multipart(Form::new().part(field.clone(), part))
            }
            None => builder,
        };

        Ok(builder.headers(options.headers.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_range() {
        let base = Duration::from_millis(1000);
        for attempt in 0..6u32 {
            let floor = 1000u64 * 2u64.pow(attempt);
            let ceiling = floor + 500 * 2u64.pow(attempt);
            for _ in 0..200 {
                let ms = backoff_delay(attempt, base).as_millis() as u64;
                assert!(ms >= floor && ms < ceiling, "attempt {}: {}ms", attempt, ms);
            }
        }
    }

    #[test]
    fn test_backoff_zero_base() {
        assert_eq!(backoff_delay(3, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_backoff_saturates() {
        let delay = backoff_delay(80, Duration::from_millis(1000));
        assert!(delay >= Duration::from_millis(u64::MAX / 2));
    }

    #[test]
    fn test_rate_limit_retryable_for_any_method() {
        assert!(is_retryable_status(&Method::GET, StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(&Method::POST, StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_server_errors_only_retried_for_get() {
        assert!(is_retryable_status(&Method::GET, StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(&Method::GET, StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_retryable_status(&Method::POST, StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(&Method::PUT, StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_client_errors_not_retried() {
        assert!(!is_retryable_status(&Method::GET, StatusCode::OK));
        assert!(!is_retryable_status(&Method::GET, StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(&Method::GET, StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_request_options_builders() {
        let opts = RequestOptions::post_json(serde_json::json!({"prompt": "a"}))
            .with_query("webhook", "https://example.com")
            .with_max_retries(Some(0));
        assert_eq!(opts.method, Method::POST);
        assert!(!opts.is_upload());
        assert_eq!(opts.query.len(), 1);
        assert_eq!(opts.max_retries, Some(0));

        let upload = RequestOptions::upload("file", "cat.png", vec![1, 2, 3]);
        assert!(upload.is_upload());
        assert_eq!(RequestOptions::get().method, Method::GET);
    }
}
