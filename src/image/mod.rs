//! Image records and ingestion.

mod ingest;
mod types;

pub(crate) use ingest::ingest_blocking;
pub use ingest::{ingest_local_file, ingest_path, RemoteFetcher};
pub use types::{ImageFormat, ImageRecord, DEFAULT_MIME_TYPE};
