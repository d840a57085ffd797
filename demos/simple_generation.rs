//! Generate a single image from a text prompt.
//!
//! Requires `WAVESPEED_API_KEY` to be set.
//!
//! ```sh
//! cargo run --example simple_generation
//! ```

use serde_json::json;
use wavespeed_rs::{CreateOptions, WaveSpeed};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let client = WaveSpeed::from_env()?;

    let input = json!({
        "prompt": "a beautiful sunset over mountains",
        "size": "1024*1024",
        "num_inference_steps": 28,
        "guidance_scale": 3.5,
    });

    // Submit
    let mut prediction = client
        .create("wavespeed-ai/flux-dev", &input, CreateOptions::default())
        .await?;
    println!("Submitted prediction: {}", prediction.id);

    // Poll until done
    client
        .wait_with_progress(&mut prediction, |p| println!("  status: {}", p.status))
        .await?;

    if prediction.is_completed() {
        for (url, nsfw) in prediction
            .outputs
            .iter()
            .zip(prediction.has_nsfw_contents.iter())
        {
            println!("Output: {} (nsfw: {})", url, nsfw);
        }
        if let Some(secs) = prediction.execution_time {
            println!("Execution time: {:.2}s", secs);
        }
    } else {
        eprintln!(
            "Generation failed: {}",
            prediction.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}
