//! Turns local files and remote images into [`ImageRecord`]s.

use crate::error::{sanitize_error_message, Result, SculptorError};
use crate::image::types::{ImageFormat, ImageRecord};
use std::path::Path;

/// MIME type assumed for remote images served without a `Content-Type`.
const REMOTE_DEFAULT_MIME: &str = "image/jpeg";

/// Validates user-supplied bytes and wraps them in an [`ImageRecord`].
///
/// The declared MIME type is trusted as given; an empty one is sniffed from
/// the bytes. Fails with [`SculptorError::Ingestion`] when the bytes are not
/// a decodable PNG, JPEG or WebP image.
pub fn ingest_local_file(bytes: Vec<u8>, declared_mime: &str) -> Result<ImageRecord> {
    if bytes.is_empty() {
        return Err(SculptorError::Ingestion("The image file is empty.".into()));
    }

    image::load_from_memory(&bytes).map_err(|e| {
        SculptorError::Ingestion(format!("Failed to read the image file: {e}"))
    })?;

    Ok(ImageRecord::new(bytes, declared_mime))
}

/// Runs an ingest on the blocking pool; decoding a large portrait is CPU-bound.
pub(crate) async fn ingest_blocking<F>(ingest: F) -> Result<ImageRecord>
where
    F: FnOnce() -> Result<ImageRecord> + Send + 'static,
{
    tokio::task::spawn_blocking(ingest)
        .await
        .map_err(|e| SculptorError::Ingestion(format!("Image decoding task failed: {e}")))?
}

/// Reads an image from disk.
///
/// Without a declared MIME type the file extension decides, then the bytes.
pub fn ingest_path(path: impl AsRef<Path>, declared_mime: Option<&str>) -> Result<ImageRecord> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        SculptorError::Ingestion(format!(
            "Failed to read the image file {}: {e}",
            path.display()
        ))
    })?;

    let mime = match declared_mime {
        Some(mime) => mime,
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|f| f.mime_type())
            .unwrap_or_default(),
    };

    ingest_local_file(bytes, mime)
}

/// Fetches remote images (e.g. a random portrait seed).
#[derive(Debug, Clone, Default)]
pub struct RemoteFetcher {
    client: reqwest::Client,
}

impl RemoteFetcher {
    /// Creates a fetcher with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher reusing an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Downloads `uri` and ingests it.
    ///
    /// Any non-success status is a network failure. The response
    /// `Content-Type` becomes the record's MIME type.
    pub async fn ingest_remote(&self, uri: &str) -> Result<ImageRecord> {
        let response = self.client.get(uri).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = status.canonical_reason().unwrap_or("request failed");
            let message = if text.trim().is_empty() {
                format!("Failed to fetch image: {reason}")
            } else {
                format!("Failed to fetch image: {reason}: {}", sanitize_error_message(&text))
            };
            return Err(SculptorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| REMOTE_DEFAULT_MIME.to_string());

        let bytes = response.bytes().await?;
        tracing::debug!(uri, mime = %mime, size = bytes.len(), "fetched remote image");

        let bytes = bytes.to_vec();
        ingest_blocking(move || ingest_local_file(bytes, &mime)).await
    }
}
