//! # wavespeed-rs
//!
//! Async Rust client for the [WaveSpeed](https://wavespeed.ai) prediction
//! API: submit image-generation jobs, poll them to completion, and upload
//! input media.
//!
//! Every call goes through one resilient request primitive with per-attempt
//! timeouts, retry on rate limiting and transient failures, and exponential
//! backoff with jitter. Predictions are plain structs that
//! [`WaveSpeed::reload`] and [`WaveSpeed::wait`] update in place.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wavespeed_rs::{CreateOptions, WaveSpeed};
//! use serde_json::json;
//!
//! # async fn example() -> wavespeed_rs::Result<()> {
//! // Reads WAVESPEED_API_KEY (and optional overrides) from the environment
//! let client = WaveSpeed::from_env()?;
//!
//! // Submit, then poll until the prediction finishes
//! let mut prediction = client
//!     .create("wavespeed-ai/flux-dev", &json!({"prompt": "a sunset over mountains"}), CreateOptions::default())
//!     .await?;
//! client.wait(&mut prediction).await?;
//!
//! if prediction.is_completed() {
//!     for url in &prediction.outputs {
//!         println!("{}", url);
//!     }
//! } else {
//!     eprintln!("failed: {:?}", prediction.error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{CreateOptions, WaveSpeed};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Result, WaveSpeedError};
pub use transport::{RequestBody, RequestOptions};
pub use types::{Envelope, Prediction, PredictionStatus, PredictionUrls, UploadedFile};
