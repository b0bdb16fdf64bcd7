//! Generation client: adapter between the orchestrator and image services.

mod client;
mod provider;
pub mod providers;
mod types;

pub use client::{classify, is_refusal, GenerationClient, NO_IMAGE_MESSAGE};
pub use provider::ImageProvider;
pub use types::{GenerationRequest, GenerationResult, ProviderReply, ReplyPart};
