use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Result, WaveSpeedError};
use crate::transport::RequestOptions;
use crate::types::*;

/// Relative path of the binary upload endpoint.
pub const UPLOAD_PATH: &str = "media/upload/binary";

const USER_AGENT: &str = concat!("wavespeed-rs/", env!("CARGO_PKG_VERSION"));

/// Options for submitting a prediction.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// URL the service calls when the prediction finishes.
    pub webhook: Option<String>,
    /// Per-attempt timeout for the submission request.
    pub timeout: Option<Duration>,
    /// Retry budget for the submission request.
    pub max_retries: Option<u32>,
    /// Overall limit on waiting in [`WaveSpeed::run`].
    pub max_wait: Option<Duration>,
}

impl CreateOptions {
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Async client for the WaveSpeed prediction API.
///
/// Submits predictions, polls them to completion, and uploads input media.
/// Every call goes through [`request`](Self::request), which adds auth,
/// per-attempt timeouts and retry with backoff. Cloning is cheap and clones
/// share the connection pool and configuration.
///
/// # Example
/// ```no_run
/// use wavespeed_rs::{CreateOptions, WaveSpeed};
/// use serde_json::json;
///
/// # async fn example() -> wavespeed_rs::Result<()> {
/// let client = WaveSpeed::from_env()?;
/// let prediction = client
///     .run("wavespeed-ai/flux-dev", &json!({"prompt": "a lighthouse"}), CreateOptions::default())
///     .await?;
/// println!("{:?}", prediction.outputs);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WaveSpeed {
    pub(crate) http: Client,
    pub(crate) config: Arc<ClientConfig>,
}

impl WaveSpeed {
    /// Create a client from a resolved configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WaveSpeedError::Network {
                context: "Failed to build HTTP client".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Create a client with an explicit API key; other settings come from
    /// the environment or defaults.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::new(api_key)?)
    }

    /// Create a client configured entirely from `WAVESPEED_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Use a custom `reqwest::Client` (for proxies, TLS, connection pooling).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── Predictions ─────────────────────────────────────────────────

    /// Submit `input` to `model` and return the newly created prediction.
    ///
    /// Fails with [`WaveSpeedError::Create`] on a non-2xx status, and also
    /// when the envelope carries an error code inside an HTTP 200.
    pub async fn create<I>(&self, model: &str, input: &I, options: CreateOptions) -> Result<Prediction>
    where
        I: Serialize + ?Sized,
    {
        if model.trim().is_empty() {
            return Err(WaveSpeedError::InvalidConfig("Model id must not be empty".into()));
        }

        let mut request = RequestOptions::post_json(serde_json::to_value(input)?)
            .with_timeout(options.timeout)
            .with_max_retries(options.max_retries);
        if let Some(webhook) = options.webhook {
            request = request.with_query("webhook", webhook);
        }

        let resp = self.request(model, request).await?;
        let prediction: Prediction =
            envelope_data(resp, |status, body| WaveSpeedError::Create { status, body }).await?;

        debug!(id = %prediction.id, model, status = %prediction.status, "prediction created");
        Ok(prediction)
    }

    /// Refresh `prediction` from the service, replacing every field with the
    /// latest snapshot.
    ///
    /// A snapshot that changes the id or moves a terminal prediction to a
    /// different status is rejected and `prediction` is left untouched.
    pub async fn reload<'a>(&self, prediction: &'a mut Prediction) -> Result<&'a mut Prediction> {
        let id = prediction.id.clone();
        let resp = self
            .request(&prediction.result_path(), RequestOptions::get())
            .await?;
        let fresh: Prediction = envelope_data(resp, |status, body| WaveSpeedError::Reload {
            id: id.clone(),
            status,
            body,
        })
        .await?;

        if fresh.id != id {
            return Err(WaveSpeedError::InvalidResponse(format!(
                "Reload of prediction {} returned prediction {}",
                id, fresh.id
            )));
        }
        if prediction.is_terminal() && fresh.status != prediction.status {
            return Err(WaveSpeedError::InvalidResponse(format!(
                "Prediction {} moved from terminal status {} to {}",
                id, prediction.status, fresh.status
            )));
        }

        debug!(id = %id, status = %fresh.status, "prediction reloaded");
        *prediction = fresh;
        Ok(prediction)
    }

    /// Poll until `prediction` is completed or failed.
    ///
    /// Returns immediately, without a request, if it is already terminal.
    /// A failed prediction is not an error; check [`Prediction::is_failed`].
    pub async fn wait<'a>(&self, prediction: &'a mut Prediction) -> Result<&'a mut Prediction> {
        self.wait_with_progress(prediction, |_| {}).await
    }

    /// Like [`wait`](Self::wait), calling `on_update` with each fresh snapshot.
    pub async fn wait_with_progress<'a, F>(
        &self,
        prediction: &'a mut Prediction,
        mut on_update: F,
    ) -> Result<&'a mut Prediction>
    where
        F: FnMut(&Prediction),
    {
        while !prediction.is_terminal() {
            tokio::time::sleep(self.config.poll_interval()).await;
            self.reload(prediction).await?;
            on_update(prediction);
        }
        Ok(prediction)
    }

    /// Like [`wait`](Self::wait), giving up after `max_wait`.
    ///
    /// On [`WaveSpeedError::WaitTimeout`] the prediction keeps the last
    /// snapshot that was fully received.
    pub async fn wait_for<'a>(
        &self,
        prediction: &'a mut Prediction,
        max_wait: Duration,
    ) -> Result<&'a mut Prediction> {
        let id = prediction.id.clone();
        let outcome = tokio::time::timeout(max_wait, self.wait(&mut *prediction)).await;
        match outcome {
            Ok(result) => {
                result?;
            }
            Err(_) => {
                return Err(WaveSpeedError::WaitTimeout {
                    id,
                    waited: max_wait,
                });
            }
        }
        Ok(prediction)
    }

    /// Submit a prediction and wait for it to finish.
    ///
    /// Honors [`CreateOptions::max_wait`] when set.
    pub async fn run<I>(&self, model: &str, input: &I, options: CreateOptions) -> Result<Prediction>
    where
        I: Serialize + ?Sized,
    {
        let max_wait = options.max_wait;
        let mut prediction = self.create(model, input, options).await?;
        match max_wait {
            Some(limit) => self.wait_for(&mut prediction, limit).await?,
            None => self.wait(&mut prediction).await?,
        };
        Ok(prediction)
    }

    // ── Uploads ─────────────────────────────────────────────────────

    /// Upload raw bytes as a multipart file and return the stored file's
    /// metadata.
    pub async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadedFile> {
        let resp = self
            .request(UPLOAD_PATH, RequestOptions::upload("file", filename, bytes))
            .await?;
        let file: UploadedFile =
            envelope_data(resp, |status, body| WaveSpeedError::Upload { status, body }).await?;
        debug!(filename = %file.filename, size = file.size, "file uploaded");
        Ok(file)
    }

    /// Upload raw bytes and return the download URL to pass as model input.
    pub async fn upload_binary(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
        Ok(self.upload(bytes, filename).await?.download_url)
    }

    /// Read a local file and upload it. Returns the download URL.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");
        self.upload_binary(bytes, filename).await
    }
}

/// Unwrap the `data` payload of a response envelope.
///
/// Both a non-2xx HTTP status and a non-200 envelope code are turned into
/// the caller's error via `on_error(status, body)`.
async fn envelope_data<T, F>(resp: Response, on_error: F) -> Result<T>
where
    T: DeserializeOwned,
    F: Fn(u16, String) -> WaveSpeedError,
{
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(on_error(status.as_u16(), body));
    }

    let text = resp.text().await.map_err(|e| WaveSpeedError::Network {
        context: "Failed to read WaveSpeed response body".into(),
        source: e,
    })?;
    let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
        WaveSpeedError::InvalidResponse(format!(
            "Malformed response (HTTP {}): {}: {}",
            status.as_u16(),
            e,
            text
        ))
    })?;

    if !envelope.is_success() {
        let body = envelope
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or(text);
        return Err(on_error(envelope.code, body));
    }

    envelope
        .data
        .ok_or_else(|| WaveSpeedError::InvalidResponse(format!("Response missing data: {}", text)))
}
