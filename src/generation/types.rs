//! Request and result types for the generation boundary.

use crate::error::{ErrorKind, SculptorError};
use crate::image::ImageRecord;

/// A single call to the image-generation service.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Image to edit; absent for text-to-image seed generation.
    pub source_image: Option<ImageRecord>,
    /// Free-text instruction.
    pub prompt: String,
}

impl GenerationRequest {
    /// Creates a text-only request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            source_image: None,
            prompt: prompt.into(),
        }
    }

    /// Creates an edit request over `image`.
    pub fn edit(image: ImageRecord, prompt: impl Into<String>) -> Self {
        Self::new(prompt).with_source_image(image)
    }

    /// Sets the image to edit.
    pub fn with_source_image(mut self, image: ImageRecord) -> Self {
        self.source_image = Some(image);
        self
    }

    /// Returns true if this is an image editing request (has a source image).
    pub fn is_edit(&self) -> bool {
        self.source_image.is_some()
    }
}

/// One part of a service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPart {
    /// An image payload, already decoded.
    Image(ImageRecord),
    /// Free text from the model.
    Text(String),
}

/// Everything a provider got back from a successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReply {
    /// Response parts in service order.
    pub parts: Vec<ReplyPart>,
}

impl ProviderReply {
    /// Creates a reply from parts.
    pub fn new(parts: Vec<ReplyPart>) -> Self {
        Self { parts }
    }

    /// A reply carrying a single image.
    pub fn image(image: ImageRecord) -> Self {
        Self::new(vec![ReplyPart::Image(image)])
    }

    /// A reply carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ReplyPart::Text(text.into())])
    }

    /// The first image part, if any.
    pub fn first_image(&self) -> Option<&ImageRecord> {
        self.parts.iter().find_map(|p| match p {
            ReplyPart::Image(image) => Some(image),
            ReplyPart::Text(_) => None,
        })
    }

    /// All text parts joined, or `None` when there is no non-blank text.
    pub fn joined_text(&self) -> Option<String> {
        let text = self
            .parts
            .iter()
            .filter_map(|p| match p {
                ReplyPart::Text(t) => Some(t.trim()),
                ReplyPart::Image(_) => None,
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        (!text.is_empty()).then_some(text)
    }
}

/// The normalized outcome of a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    /// The service produced an image.
    Success(ImageRecord),
    /// The call succeeded but the model answered with non-refusal text only.
    Empty,
    /// The call failed or the model refused.
    Failure {
        /// Drives programmatic handling.
        kind: ErrorKind,
        /// Human-readable text, preserved from the service where possible.
        message: String,
    },
}

impl GenerationResult {
    /// Builds a failure from a crate error.
    pub fn from_error(err: &SculptorError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Returns true for [`GenerationResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The produced image, if any.
    pub fn image(&self) -> Option<&ImageRecord> {
        match self {
            Self::Success(image) => Some(image),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImageRecord {
        ImageRecord::new(vec![1, 2, 3], "image/png")
    }

    #[test]
    fn test_request_builders() {
        let req = GenerationRequest::new("a keyring");
        assert!(!req.is_edit());

        let req = GenerationRequest::edit(record(), "make it marble");
        assert!(req.is_edit());
        assert_eq!(req.prompt, "make it marble");
    }

    #[test]
    fn test_first_image_skips_text() {
        let reply = ProviderReply::new(vec![
            ReplyPart::Text("here you go".into()),
            ReplyPart::Image(record()),
        ]);
        assert_eq!(reply.first_image(), Some(&record()));
        assert_eq!(reply.joined_text().as_deref(), Some("here you go"));
    }

    #[test]
    fn test_joined_text_ignores_blank_parts() {
        let reply = ProviderReply::new(vec![
            ReplyPart::Text("  ".into()),
            ReplyPart::Text("first".into()),
            ReplyPart::Text("second".into()),
        ]);
        assert_eq!(reply.joined_text().as_deref(), Some("first\nsecond"));
        assert_eq!(ProviderReply::default().joined_text(), None);
    }

    #[test]
    fn test_result_from_error() {
        let result = GenerationResult::from_error(&SculptorError::ContentBlocked("no".into()));
        assert_eq!(
            result,
            GenerationResult::Failure {
                kind: ErrorKind::PolicyRefusal,
                message: "no".into()
            }
        );
        assert!(!result.is_success());
        assert!(result.image().is_none());
    }
}
