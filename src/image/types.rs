//! Core image types.

use crate::error::{Result, SculptorError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// MIME type assumed when neither the source nor the bytes say otherwise.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Supported raster formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Maps a MIME type (parameters ignored) to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// An immutable in-memory image: raw bytes, MIME type and a display reference.
///
/// The display reference is a self-contained `data:` URI, so it always maps
/// back to the same bytes and MIME type (see [`ImageRecord::from_data_url`]).
/// Records are cheap to clone; replacing an image means building a new record.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRecord {
    bytes: Arc<[u8]>,
    mime_type: String,
    display_ref: String,
}

impl ImageRecord {
    /// Creates a record from raw bytes and a MIME type.
    ///
    /// An empty MIME type is replaced by one sniffed from the bytes, or
    /// [`DEFAULT_MIME_TYPE`].
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let mut mime_type: String = mime_type.into();
        if mime_type.trim().is_empty() {
            mime_type = ImageFormat::from_magic_bytes(&bytes)
                .map(|f| f.mime_type())
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string();
        }

        let display_ref = format!(
            "data:{};base64,{}",
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        Self {
            bytes: bytes.into(),
            mime_type,
            display_ref,
        }
    }

    /// Creates a record from base64 data, as returned by generation services.
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self> {
        let bytes = decode_base64_lenient(data).map_err(|e| SculptorError::Decode(e.to_string()))?;
        Ok(Self::new(bytes, mime_type))
    }

    /// Parses a `data:<mime>;base64,<payload>` URI back into a record.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| SculptorError::Decode("not a data URL".into()))?;
        // Base64 never contains a comma, MIME parameters can
        let (header, payload) = rest
            .rsplit_once(',')
            .ok_or_else(|| SculptorError::Decode("data URL has no payload".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| SculptorError::Decode("data URL is not base64 encoded".into()))?;
        Self::from_base64(payload, mime_type)
    }

    /// Raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type, as declared by the source.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// A `data:` URI suitable for direct rendering.
    pub fn display_ref(&self) -> &str {
        &self.display_ref
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Known format for the declared MIME type, falling back to the bytes.
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(&self.mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&self.bytes))
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for ImageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRecord")
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Decodes base64 that may carry a data URI prefix, whitespace or no padding.
pub(crate) fn decode_base64_lenient(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"hello"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_mime_type("IMAGE/PNG; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_display_ref_is_data_url() {
        let record = ImageRecord::new(PNG_MAGIC.to_vec(), "image/png");
        assert!(record.display_ref().starts_with("data:image/png;base64,"));
        assert_eq!(record.size(), 12);
    }

    #[test]
    fn test_data_url_roundtrip_preserves_bytes_and_mime() {
        let record = ImageRecord::new(JPEG_MAGIC.to_vec(), "image/jpeg");
        let parsed = ImageRecord::from_data_url(record.display_ref()).unwrap();
        assert_eq!(parsed.bytes(), record.bytes());
        assert_eq!(parsed.mime_type(), "image/jpeg");
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_data_url_roundtrip_with_quoted_mime_parameter() {
        let mime = "image/png; name=\"a,b.png\"";
        let record = ImageRecord::new(PNG_MAGIC.to_vec(), mime);
        let parsed = ImageRecord::from_data_url(record.display_ref()).unwrap();
        assert_eq!(parsed.mime_type(), mime);
        assert_eq!(parsed.bytes(), &PNG_MAGIC[..]);
    }

    #[test]
    fn test_record_format_prefers_declared_mime() {
        let record = ImageRecord::new(PNG_MAGIC.to_vec(), "image/jpeg");
        assert_eq!(record.format(), Some(ImageFormat::Jpeg));
        assert_eq!(record.format().map(|f| f.extension()), Some("jpg"));

        let record = ImageRecord::new(WEBP_MAGIC.to_vec(), "application/octet-stream");
        assert_eq!(record.format(), Some(ImageFormat::WebP));

        let record = ImageRecord::new(b"plain".to_vec(), "text/plain");
        assert_eq!(record.format(), None);
    }

    #[test]
    fn test_empty_mime_is_sniffed() {
        let record = ImageRecord::new(WEBP_MAGIC.to_vec(), "");
        assert_eq!(record.mime_type(), "image/webp");

        let record = ImageRecord::new(b"not an image".to_vec(), " ");
        assert_eq!(record.mime_type(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_from_data_url_rejects_garbage() {
        assert!(ImageRecord::from_data_url("https://example.com/a.png").is_err());
        assert!(ImageRecord::from_data_url("data:image/png,rawtext").is_err());
        assert!(ImageRecord::from_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn test_lenient_base64() {
        assert_eq!(decode_base64_lenient("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64_lenient("aGVs\nbG8").unwrap(), b"hello");
        assert_eq!(
            decode_base64_lenient("data:text/plain;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_debug_omits_bytes() {
        let record = ImageRecord::new(PNG_MAGIC.to_vec(), "image/png");
        let debug = format!("{record:?}");
        assert!(debug.contains("size: 12"));
        assert!(!debug.contains("base64"));
    }
}
