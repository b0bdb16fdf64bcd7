//! Classifies provider replies into [`GenerationResult`]s.

use crate::error::ErrorKind;
use crate::generation::provider::ImageProvider;
use crate::generation::types::{GenerationRequest, GenerationResult, ProviderReply};
use std::sync::Arc;
use std::time::Instant;

/// Message used when the service sent neither an image nor any text.
pub const NO_IMAGE_MESSAGE: &str = "model returned no image";

/// Wording that marks a text-only reply as a refusal.
const REFUSAL_MARKERS: &[&str] = &[
    "cannot",
    "can't",
    "can not",
    "unable",
    "not able to",
    "won't",
    "will not",
    "refuse",
    "not allowed",
    "against my",
    "policy",
    "policies",
];

/// Returns true if a text-only reply reads like the model declining.
pub fn is_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    REFUSAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// The single entry point the orchestrator uses to reach the service.
///
/// Holds an injected provider; never touches session state.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn ImageProvider>,
}

impl GenerationClient {
    /// Wraps a provider.
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self { provider }
    }

    /// The wrapped provider's display name.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Checks the wrapped provider.
    pub async fn health_check(&self) -> crate::Result<()> {
        self.provider.health_check().await
    }

    /// Runs one request and normalizes the outcome.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let start = Instant::now();
        let outcome = self.provider.generate(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(reply) => {
                let result = classify(reply);
                tracing::debug!(
                    provider = self.provider.name(),
                    edit = request.is_edit(),
                    duration_ms,
                    success = result.is_success(),
                    "generation call finished"
                );
                result
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    kind = %e.kind(),
                    duration_ms,
                    "generation call failed: {e}"
                );
                GenerationResult::from_error(&e)
            }
        }
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// First image wins; otherwise text decides between refusal and empty.
pub fn classify(reply: ProviderReply) -> GenerationResult {
    if let Some(image) = reply.first_image() {
        return GenerationResult::Success(image.clone());
    }

    match reply.joined_text() {
        Some(text) if is_refusal(&text) => GenerationResult::Failure {
            kind: ErrorKind::PolicyRefusal,
            message: format!(
                "The AI model responded: \"{text}\". This might be due to a safety policy."
            ),
        },
        Some(_) => GenerationResult::Empty,
        None => GenerationResult::Failure {
            kind: ErrorKind::NoImageReturned,
            message: NO_IMAGE_MESSAGE.to_string(),
        },
    }
}
