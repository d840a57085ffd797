//! Upload a local image and run an image-to-image model on it.
//!
//! Requires `WAVESPEED_API_KEY` to be set.
//!
//! ```sh
//! cargo run --example upload_and_edit -- ./photo.png
//! ```

use serde_json::json;
use std::time::Duration;
use wavespeed_rs::{CreateOptions, WaveSpeed, WaveSpeedError};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: upload_and_edit <image>");
            return Ok(());
        }
    };

    let client = WaveSpeed::from_env()?;

    let image_url = client.upload_file(&path).await?;
    println!("Uploaded: {}", image_url);

    let input = json!({
        "image": image_url,
        "prompt": "turn this photo into a watercolor painting",
    });

    let options = CreateOptions::default().with_max_wait(Duration::from_secs(300));
    match client.run("wavespeed-ai/flux-kontext-dev", &input, options).await {
        Ok(prediction) if prediction.is_completed() => {
            println!("Result: {}", prediction.first_output().unwrap_or("<no output>"));
        }
        Ok(prediction) => eprintln!("Edit failed: {:?}", prediction.error),
        Err(WaveSpeedError::WaitTimeout { id, waited }) => {
            eprintln!("Prediction {} still running after {:?}", id, waited)
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
