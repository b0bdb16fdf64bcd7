//! Converts a portrait into a marble sculpture.
//!
//! Run with: `cargo run --example convert -- <portrait.jpg>`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use sculptor::{GeminiProvider, Phase, Studio, StudioConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> sculptor::Result<()> {
    let input_path = std::env::args()
        .nth(1)
        .expect("Usage: convert <portrait.jpg>");

    let provider = GeminiProvider::builder().build()?;
    let studio = Studio::new(Arc::new(provider), StudioConfig::default());

    studio.upload_path(&input_path).await?;

    let state = studio.snapshot();
    match (state.phase, state.current, state.error) {
        (Phase::Ready, Some(sculpture), _) => {
            sculpture.save("sculpture.png")?;
            println!("Saved sculpture.png ({} bytes)", sculpture.size());
        }
        (_, _, Some(err)) => eprintln!("Conversion failed ({}): {}", err.kind, err.message),
        _ => eprintln!("Conversion failed"),
    }

    Ok(())
}
