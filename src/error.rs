//! Error types for ingestion, generation and orchestration.

use serde::{Deserialize, Serialize};

/// Maximum length of a service error message kept for display.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while ingesting or generating images.
#[derive(Debug, thiserror::Error)]
pub enum SculptorError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded. `retry_after` is the service's hint in seconds.
    #[error("rate limited by the image service{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    /// The service declined to produce an image.
    #[error("{0}")]
    ContentBlocked(String),

    /// The service answered without a usable image.
    #[error("{0}")]
    NoImage(String),

    /// Local file unreadable or not an image.
    #[error("{0}")]
    Ingestion(String),

    /// Failed to decode base64 or a data URL.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Operation not allowed in the current state.
    #[error("{0}")]
    Validation(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (e.g. reading an input file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image bytes could not be decoded.
    #[error("unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),
}

/// The small failure taxonomy the orchestrator reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Local file unreadable or undecodable.
    Ingestion,
    /// Transport or service failure reaching a remote endpoint.
    Network,
    /// The service declined to produce an image.
    PolicyRefusal,
    /// The service answered successfully but without a usable image.
    NoImageReturned,
    /// Operation invoked in a state that does not allow it.
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ingestion => "ingestion_error",
            Self::Network => "network_error",
            Self::PolicyRefusal => "policy_refusal",
            Self::NoImageReturned => "no_image_returned",
            Self::Validation => "validation_error",
        };
        f.write_str(s)
    }
}

impl SculptorError {
    /// Projects this error onto the orchestration taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ingestion(_) | Self::Io(_) | Self::Image(_) => ErrorKind::Ingestion,
            Self::Auth(_) | Self::Api { .. } | Self::RateLimited { .. } | Self::Network(_) => {
                ErrorKind::Network
            }
            Self::ContentBlocked(_) => ErrorKind::PolicyRefusal,
            // A malformed body or an undecodable image part both leave the
            // caller without a usable image.
            Self::NoImage(_) | Self::Decode(_) | Self::Json(_) => ErrorKind::NoImageReturned,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match *retry_after {
        Some(secs) => format!(", retry in {secs}s"),
        None => ", please try again later".to_string(),
    }
}

/// Result type alias for sculptor operations.
pub type Result<T> = std::result::Result<T, SculptorError>;

/// Trims a service error body for display and strips anything resembling a key.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric());
            if bare.starts_with("AIza") && bare.len() >= 30 {
                word.replace(bare, "[REDACTED]")
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");

    if joined.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}

/// Reads a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_projection() {
        assert_eq!(
            SculptorError::Ingestion("bad".into()).kind(),
            ErrorKind::Ingestion
        );
        assert_eq!(
            SculptorError::Api {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(
            SculptorError::RateLimited { retry_after: None }.kind(),
            ErrorKind::Network
        );
        assert_eq!(
            SculptorError::ContentBlocked("nope".into()).kind(),
            ErrorKind::PolicyRefusal
        );
        assert_eq!(
            SculptorError::Decode("bad base64".into()).kind(),
            ErrorKind::NoImageReturned
        );
        assert_eq!(
            SculptorError::Validation("busy".into()).kind(),
            ErrorKind::Validation
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(SculptorError::from(io).kind(), ErrorKind::Ingestion);
    }

    #[test]
    fn test_error_display() {
        let err = SculptorError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = SculptorError::ContentBlocked("Safety filter triggered".into());
        assert_eq!(err.to_string(), "Safety filter triggered");
    }

    #[test]
    fn test_rate_limited_display() {
        let err = SculptorError::RateLimited {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "rate limited by the image service, retry in 30s");

        let err = SculptorError::RateLimited { retry_after: None };
        assert_eq!(
            err.to_string(),
            "rate limited by the image service, please try again later"
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::PolicyRefusal.to_string(), "policy_refusal");
        assert_eq!(ErrorKind::NoImageReturned.to_string(), "no_image_returned");
    }

    #[test]
    fn test_sanitize_redacts_keys_and_truncates() {
        let msg = "invalid key AIzaSyA1234567890abcdefghijklmnopqrstu provided";
        let clean = sanitize_error_message(msg);
        assert!(clean.contains("[REDACTED]"));
        assert!(!clean.contains("AIzaSy"));

        let long = "x".repeat(MAX_ERROR_MESSAGE_LEN + 50);
        let clean = sanitize_error_message(&long);
        assert!(clean.ends_with("..."));
        assert_eq!(clean.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(30));

        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }
}
