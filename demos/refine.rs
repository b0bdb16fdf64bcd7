//! Converts a portrait, then refines the sculpture while printing progress.
//!
//! Run with: `cargo run --example refine -- <portrait.jpg> "Add subtle gold veins"`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use sculptor::{GeminiProvider, Studio, StudioConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> sculptor::Result<()> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next().expect("Usage: refine <portrait.jpg> <refinement>");
    let refinement = args.next().unwrap_or_else(|| "Add subtle gold veins".to_string());

    let provider = GeminiProvider::builder().build()?;
    let studio = Studio::new(Arc::new(provider), StudioConfig::default());

    let mut updates = studio.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            match state.caption {
                Some(caption) => println!("[{}] {caption}", state.phase),
                None => println!("[{}]", state.phase),
            }
        }
    });

    studio.upload_path(&input_path).await?;
    studio.refine(&refinement).await?;

    let state = studio.snapshot();
    if let Some(err) = state.error {
        eprintln!("Failed ({}): {}", err.kind, err.message);
    } else if let Some(sculpture) = state.current {
        sculpture.save("refined.png")?;
        println!("Saved refined.png ({} bytes)", sculpture.size());
    }

    Ok(())
}
