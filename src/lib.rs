#![warn(missing_docs)]
//! Sculptor - turn portraits into photorealistic marble sculptures.
//!
//! The crate is split into three layers:
//!
//! - [`image`]: ingestion of local files and remote images into
//!   [`ImageRecord`]s (bytes + MIME type + `data:` URI).
//! - [`generation`]: the [`ImageProvider`] trait, concrete providers, and the
//!   [`GenerationClient`] that classifies replies into a [`GenerationResult`].
//! - [`studio`]: the [`Studio`] state machine that sequences upload,
//!   conversion and refinement for one interactive session.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sculptor::{GeminiProvider, Phase, Studio, StudioConfig};
//!
//! #[tokio::main]
//! async fn main() -> sculptor::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let studio = Studio::new(Arc::new(provider), StudioConfig::default());
//!
//!     studio.upload_path("portrait.jpg").await?;
//!     studio.refine("Add subtle gold veins").await?;
//!
//!     let state = studio.snapshot();
//!     if state.phase == Phase::Ready {
//!         if let Some(sculpture) = state.current {
//!             sculpture.save("sculpture.png")?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini`: Gemini (Google) image editing provider
//! - `cli`: the `sculptor` command-line interface

mod error;
pub mod generation;
pub mod image;
pub mod studio;

#[cfg(test)]
mod test_support;

pub use crate::error::{ErrorKind, Result, SculptorError};
pub use crate::generation::{
    GenerationClient, GenerationRequest, GenerationResult, ImageProvider, ProviderReply,
    ReplyPart,
};
pub use crate::image::{ImageFormat, ImageRecord};
pub use crate::studio::{
    OperationOutcome, Phase, SeedPolicy, SeedSource, SessionError, SessionState, Studio,
    StudioConfig,
};

#[cfg(feature = "gemini")]
pub use crate::generation::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorKind, Result, SculptorError};
    pub use crate::generation::{GenerationRequest, GenerationResult, ImageProvider};
    pub use crate::image::ImageRecord;
    pub use crate::studio::{Phase, SessionState, Studio, StudioConfig};

    #[cfg(feature = "gemini")]
    pub use crate::generation::providers::GeminiProvider;
}
