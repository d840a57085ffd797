use std::time::Duration;
use thiserror::Error;

/// Errors returned by WaveSpeed operations.
#[derive(Error, Debug)]
pub enum WaveSpeedError {
    /// No API key was passed explicitly and `WAVESPEED_API_KEY` is unset.
    #[error("API key is required: pass one explicitly or set WAVESPEED_API_KEY")]
    MissingApiKey,

    /// A configuration value could not be parsed or is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Submitting a prediction failed, either at the HTTP level or with an
    /// application-level error code inside a successful response.
    #[error("Failed to create prediction (status {status}): {body}")]
    Create { status: u16, body: String },

    /// Fetching the current state of a prediction failed.
    #[error("Failed to reload prediction {id} (status {status}): {body}")]
    Reload { id: String, status: u16, body: String },

    /// Uploading a file failed.
    #[error("Failed to upload file (status {status}): {body}")]
    Upload { status: u16, body: String },

    /// Every attempt of a request ran past its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Gave up waiting for a prediction to reach a terminal state.
    #[error("Prediction {id} did not finish within {waited:?}")]
    WaitTimeout { id: String, waited: Duration },

    /// The response was missing expected fields or contradicted the
    /// prediction lifecycle.
    #[error("{0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file access error (uploads from disk).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaveSpeedError {
    /// HTTP or application status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            WaveSpeedError::Create { status, .. }
            | WaveSpeedError::Reload { status, .. }
            | WaveSpeedError::Upload { status, .. } => Some(*status),
            WaveSpeedError::Network { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, WaveSpeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = WaveSpeedError::Create {
            status: 400,
            body: "bad input".into(),
        };
        assert_eq!(err.status(), Some(400));

        let err = WaveSpeedError::Reload {
            id: "p1".into(),
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(err.status(), Some(404));

        assert_eq!(WaveSpeedError::MissingApiKey.status(), None);
    }

    #[test]
    fn test_error_messages() {
        let err = WaveSpeedError::Upload {
            status: 413,
            body: "too large".into(),
        };
        assert_eq!(err.to_string(), "Failed to upload file (status 413): too large");

        let err = WaveSpeedError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Request timed out after 5s");
    }
}
