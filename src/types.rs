use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Application-level success code inside every response envelope.
pub const SUCCESS_CODE: u16 = 200;

/// Lifecycle state of a prediction: Created -> Processing -> Completed/Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PredictionStatus::Created => "created",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Completed => "completed",
            PredictionStatus::Failed => "failed",
        }
    }

    /// `Completed` and `Failed` never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PredictionStatus::Completed | PredictionStatus::Failed)
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locators returned alongside a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionUrls {
    /// Full URL for fetching the prediction's current state.
    #[serde(default)]
    pub get: Option<String>,
}

/// Client-side record of one remote prediction.
///
/// Returned by [`WaveSpeed::create`](crate::WaveSpeed::create) and updated
/// in place by [`reload`](crate::WaveSpeed::reload) and
/// [`wait`](crate::WaveSpeed::wait). Outputs stay empty until the
/// prediction completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub status: PredictionStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_nsfw_contents: Vec<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urls: PredictionUrls,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub error: Option<String>,
    /// Execution time reported by the service once terminal.
    #[serde(default, rename = "executionTime", skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

impl Prediction {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status == PredictionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == PredictionStatus::Failed
    }

    pub fn first_output(&self) -> Option<&str> {
        self.outputs.first().map(String::as_str)
    }

    /// Relative path of the status endpoint for this prediction.
    pub fn result_path(&self) -> String {
        format!("predictions/{}/result", self.id)
    }
}

/// Outer wrapper around every JSON response from the service.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Metadata for a file stored by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(rename = "type", default)]
    pub file_type: String,
    pub download_url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The service sends `"error": ""` for predictions that have not failed.
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}
