//! The session state machine.
//!
//! Sequences ingestion, generation and refinement, and is the only writer of
//! [`SessionState`]. Each operation runs in three steps:
//!
//! 1. a synchronous gate that checks the phase, bumps the epoch and moves to
//!    the busy phase;
//! 2. the suspending work (remote fetch, generation call) with no lock held;
//! 3. a commit that applies the outcome only if the epoch is unchanged.
//!
//! `clear` bumps the epoch too, so a response that lands after a clear is
//! dropped instead of resurrecting the cleared session.

use crate::error::{ErrorKind, Result, SculptorError};
use crate::generation::{GenerationClient, GenerationRequest, GenerationResult, ImageProvider};
use crate::image::{ingest_blocking, ingest_local_file, ingest_path, ImageRecord, RemoteFetcher};
use crate::studio::caption::CaptionTicker;
use crate::studio::config::{SeedPolicy, SeedSource, StudioConfig};
use crate::studio::state::{Phase, SessionCell, SessionError, SessionState};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

const BUSY_MESSAGE: &str = "Another operation is in progress. Please wait for it to finish.";
const NOTHING_TO_REFINE_MESSAGE: &str = "No generated image to refine. Upload an image first.";
const EMPTY_REFINEMENT_MESSAGE: &str = "Please describe the refinement to apply.";
const NO_IMAGE_FROM_CONVERSION: &str = "The AI model did not return an image. Please try again.";
const NO_IMAGE_FROM_REFINEMENT: &str = "The AI model did not return a refined image.";
const RANDOM_FETCH_FAILED: &str =
    "Failed to fetch a random image. Please try again or upload your own.";

/// How an accepted operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The outcome was committed; the session is now in this phase.
    Completed(Phase),
    /// The session was cleared while the operation was in flight.
    Discarded,
}

/// Orchestrates one interactive sculpting session.
///
/// Cheap to clone; clones drive the same session.
#[derive(Clone)]
pub struct Studio {
    cell: Arc<SessionCell>,
    client: GenerationClient,
    fetcher: RemoteFetcher,
    config: Arc<StudioConfig>,
}

impl Studio {
    /// Creates a studio over an injected provider.
    pub fn new(provider: Arc<dyn ImageProvider>, config: StudioConfig) -> Self {
        Self {
            cell: Arc::new(SessionCell::new()),
            client: GenerationClient::new(provider),
            fetcher: RemoteFetcher::new(),
            config: Arc::new(config),
        }
    }

    /// Replaces the fetcher used for remote seeds.
    pub fn with_fetcher(mut self, fetcher: RemoteFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// The generation client in use.
    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.cell.snapshot()
    }

    /// Receiver that yields a new state on every change.
    ///
    /// States are published while the session lock is held, so they arrive in
    /// commit order. Clone out of `borrow()` before calling back into the
    /// studio: a live borrow guard blocks the next publish, and with it every
    /// operation that changes state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.cell.subscribe()
    }

    /// Uploads raw bytes and runs the initial conversion.
    pub async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<OperationOutcome> {
        let epoch = self.begin_upload()?;
        let mime_type = mime_type.to_string();
        let ingested = ingest_blocking(move || ingest_local_file(bytes, &mime_type)).await;
        self.finish_upload(epoch, ingested).await
    }

    /// Uploads an image file and runs the initial conversion.
    pub async fn upload_path(&self, path: impl AsRef<Path>) -> Result<OperationOutcome> {
        let epoch = self.begin_upload()?;
        let path = path.as_ref().to_path_buf();
        let ingested = ingest_blocking(move || ingest_path(path, None)).await;
        self.finish_upload(epoch, ingested).await
    }

    /// Obtains a random seed image and runs the initial conversion over it.
    pub async fn request_random(&self) -> Result<OperationOutcome> {
        let epoch = self.begin(Phase::Uploading, "random", |s| {
            s.original = None;
            s.current = None;
        })?;

        let seed = match &self.config.seed_source {
            SeedSource::Remote { url } => {
                self.fetcher.ingest_remote(url).await.map_err(|e| {
                    tracing::warn!(url = %url, "random seed fetch failed: {e}");
                    let kind = e.kind();
                    SessionError::new(kind, RANDOM_FETCH_FAILED)
                })
            }
            SeedSource::Generated => {
                let request = GenerationRequest::new(self.config.random_seed_prompt());
                match self.client.generate(&request).await {
                    GenerationResult::Success(image) => Ok(image),
                    GenerationResult::Empty => Err(SessionError::new(
                        ErrorKind::NoImageReturned,
                        NO_IMAGE_FROM_CONVERSION,
                    )),
                    GenerationResult::Failure { kind, message } => {
                        Err(SessionError::new(kind, message))
                    }
                }
            }
        };

        match seed {
            Ok(seed) => self.convert(epoch, seed, self.config.seed_policy).await,
            Err(err) => Ok(self.fail(epoch, err)),
        }
    }

    /// Applies a refinement to the original image.
    ///
    /// Rejected with [`SculptorError::Validation`], without a phase change,
    /// when another request is in flight or there is nothing to refine.
    pub async fn refine(&self, refinement: &str) -> Result<OperationOutcome> {
        let refinement = refinement.trim();
        if refinement.is_empty() {
            return Err(SculptorError::Validation(EMPTY_REFINEMENT_MESSAGE.into()));
        }

        let (epoch, base) = {
            let mut inner = self.cell.lock();
            if inner.state.phase.is_busy() {
                return Err(SculptorError::Validation(BUSY_MESSAGE.into()));
            }
            let Some(base) = inner.state.original.clone() else {
                inner.state.error = Some(SessionError::new(
                    ErrorKind::Validation,
                    NOTHING_TO_REFINE_MESSAGE,
                ));
                self.cell.publish(&inner.state);
                return Err(SculptorError::Validation(NOTHING_TO_REFINE_MESSAGE.into()));
            };

            inner.epoch += 1;
            inner.state.phase = Phase::Refining;
            inner.state.error = None;
            self.cell.publish(&inner.state);
            tracing::debug!(epoch = inner.epoch, refinement, "refinement started");
            (inner.epoch, base)
        };

        let request = GenerationRequest::edit(base, self.config.refine_prompt(refinement));
        let result = {
            let _caption = self.caption(epoch);
            self.client.generate(&request).await
        };

        // A failed refinement keeps the previous sculpture on screen.
        let error = match result {
            GenerationResult::Success(image) => {
                return Ok(self.commit(epoch, |s| {
                    s.phase = Phase::Ready;
                    s.current = Some(image);
                    s.error = None;
                }));
            }
            GenerationResult::Empty => {
                SessionError::new(ErrorKind::NoImageReturned, NO_IMAGE_FROM_REFINEMENT)
            }
            GenerationResult::Failure { kind, message } => SessionError::new(kind, message),
        };

        tracing::warn!(epoch, kind = %error.kind, "refinement failed: {}", error.message);
        Ok(self.commit(epoch, |s| {
            s.phase = Phase::Ready;
            s.error = Some(error);
        }))
    }

    /// Resets the session. Accepted in any phase; in-flight results are dropped.
    pub fn clear(&self) {
        let mut inner = self.cell.lock();
        inner.epoch += 1;
        inner.state = SessionState::default();
        self.cell.publish(&inner.state);
        tracing::debug!(epoch = inner.epoch, "session cleared");
    }

    fn begin_upload(&self) -> Result<u64> {
        self.begin(Phase::Uploading, "upload", |s| s.current = None)
    }

    /// Phase gate for top-level operations.
    fn begin(
        &self,
        phase: Phase,
        operation: &'static str,
        reset: impl FnOnce(&mut SessionState),
    ) -> Result<u64> {
        let mut inner = self.cell.lock();
        if inner.state.phase.is_busy() {
            tracing::debug!(operation, phase = %inner.state.phase, "operation refused while busy");
            return Err(SculptorError::Validation(BUSY_MESSAGE.into()));
        }

        inner.epoch += 1;
        inner.state.phase = phase;
        inner.state.error = None;
        reset(&mut inner.state);
        self.cell.publish(&inner.state);
        tracing::debug!(epoch = inner.epoch, operation, "operation started");
        Ok(inner.epoch)
    }

    async fn finish_upload(
        &self,
        epoch: u64,
        ingested: Result<ImageRecord>,
    ) -> Result<OperationOutcome> {
        match ingested {
            Ok(record) => self.convert(epoch, record, SeedPolicy::Tracked).await,
            Err(e) => Ok(self.fail(epoch, SessionError::from(&e))),
        }
    }

    /// Initial conversion of a freshly ingested image.
    async fn convert(
        &self,
        epoch: u64,
        source: ImageRecord,
        policy: SeedPolicy,
    ) -> Result<OperationOutcome> {
        let shown = source.clone();
        let entered = self.cell.update_if(epoch, |s| {
            s.phase = Phase::Generating;
            s.original = Some(shown);
        });
        if !entered {
            return Ok(self.discarded(epoch));
        }

        let request = GenerationRequest::edit(source.clone(), self.config.style_prompt.clone());
        let result = {
            let _caption = self.caption(epoch);
            self.client.generate(&request).await
        };

        match result {
            GenerationResult::Success(image) => {
                let original = match policy {
                    SeedPolicy::Tracked => source,
                    SeedPolicy::OneShot => image.clone(),
                };
                Ok(self.commit(epoch, |s| {
                    s.phase = Phase::Ready;
                    s.original = Some(original);
                    s.current = Some(image);
                    s.error = None;
                }))
            }
            GenerationResult::Empty => Ok(self.fail(
                epoch,
                SessionError::new(ErrorKind::NoImageReturned, NO_IMAGE_FROM_CONVERSION),
            )),
            GenerationResult::Failure { kind, message } => {
                Ok(self.fail(epoch, SessionError::new(kind, message)))
            }
        }
    }

    /// Terminal failure of an upload or conversion; the user must re-upload.
    fn fail(&self, epoch: u64, error: SessionError) -> OperationOutcome {
        tracing::warn!(epoch, kind = %error.kind, "operation failed: {}", error.message);
        self.commit(epoch, |s| {
            s.phase = Phase::Failed;
            s.original = None;
            s.current = None;
            s.error = Some(error);
        })
    }

    fn commit(&self, epoch: u64, f: impl FnOnce(&mut SessionState)) -> OperationOutcome {
        let mut phase = Phase::Idle;
        let applied = self.cell.update_if(epoch, |s| {
            f(s);
            s.caption = None;
            phase = s.phase;
        });
        if applied {
            tracing::debug!(epoch, phase = %phase, "operation committed");
            OperationOutcome::Completed(phase)
        } else {
            self.discarded(epoch)
        }
    }

    fn discarded(&self, epoch: u64) -> OperationOutcome {
        tracing::debug!(epoch, "discarding stale completion");
        OperationOutcome::Discarded
    }

    fn caption(&self, epoch: u64) -> CaptionTicker {
        CaptionTicker::start(
            Arc::clone(&self.cell),
            epoch,
            &self.config.captions,
            self.config.caption_interval(),
        )
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("client", &self.client)
            .field("phase", &self.snapshot().phase)
            .finish()
    }
}
