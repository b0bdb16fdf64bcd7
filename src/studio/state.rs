//! Session state and its single owner cell.

use crate::error::{ErrorKind, SculptorError};
use crate::image::ImageRecord;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

/// Discrete state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing loaded.
    #[default]
    Idle,
    /// Reading a file or obtaining a random seed.
    Uploading,
    /// Initial conversion in flight.
    Generating,
    /// Refinement in flight.
    Refining,
    /// A sculpture is available.
    Ready,
    /// The last top-level operation failed.
    Failed,
}

impl Phase {
    /// True while a request is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Uploading | Self::Generating | Self::Refining)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Generating => "generating",
            Self::Refining => "refining",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A stored, displayable failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionError {
    /// Taxonomy bucket.
    pub kind: ErrorKind,
    /// Message for the user.
    pub message: String,
}

impl SessionError {
    /// Creates an error record.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&SculptorError> for SessionError {
    fn from(err: &SculptorError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Base image for every refinement.
    pub original: Option<ImageRecord>,
    /// Latest successful result.
    pub current: Option<ImageRecord>,
    /// Orchestrator phase.
    pub phase: Phase,
    /// Last failure, if any.
    pub error: Option<SessionError>,
    /// Rotating progress caption while a request is in flight.
    pub caption: Option<String>,
}

pub(crate) struct Inner {
    pub(crate) state: SessionState,
    pub(crate) epoch: u64,
}

/// Owns the session state; every mutation is published to watchers.
pub(crate) struct SessionCell {
    inner: Mutex<Inner>,
    tx: watch::Sender<SessionState>,
}

impl SessionCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::default(),
                epoch: 0,
            }),
            tx,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is replaced field-by-field under the lock and never left torn.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Callers hold the session lock, which keeps publishes in commit order.
    pub(crate) fn publish(&self, state: &SessionState) {
        self.tx.send_replace(state.clone());
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub(crate) fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Applies `f` only if `epoch` is still current. Returns false for stale work.
    pub(crate) fn update_if(&self, epoch: u64, f: impl FnOnce(&mut SessionState)) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        f(&mut inner.state);
        self.publish(&inner.state);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_phases() {
        assert!(Phase::Uploading.is_busy());
        assert!(Phase::Generating.is_busy());
        assert!(Phase::Refining.is_busy());
        assert!(!Phase::Idle.is_busy());
        assert!(!Phase::Ready.is_busy());
        assert!(!Phase::Failed.is_busy());
    }

    #[test]
    fn test_update_if_rejects_stale_epoch() {
        let cell = SessionCell::new();
        let rx = cell.subscribe();

        assert!(cell.update_if(0, |s| s.phase = Phase::Ready));
        assert_eq!(rx.borrow().phase, Phase::Ready);

        cell.lock().epoch = 1;
        assert!(!cell.update_if(0, |s| s.phase = Phase::Failed));
        assert_eq!(cell.snapshot().phase, Phase::Ready);
    }

    #[tokio::test]
    async fn test_subscriber_sees_every_commit_in_order() {
        let cell = std::sync::Arc::new(SessionCell::new());
        let mut rx = cell.subscribe();

        let writer = {
            let cell = cell.clone();
            tokio::spawn(async move {
                for phase in [Phase::Uploading, Phase::Generating, Phase::Ready] {
                    cell.update_if(0, |s| s.phase = phase);
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut seen = Vec::new();
        while seen.last() != Some(&Phase::Ready) {
            rx.changed().await.unwrap();
            // Clone out before touching the cell again
            let phase = rx.borrow_and_update().phase;
            assert_eq!(cell.snapshot().phase, phase);
            seen.push(phase);
        }
        writer.await.unwrap();
        assert_eq!(seen, vec![Phase::Uploading, Phase::Generating, Phase::Ready]);
    }

    #[test]
    fn test_session_error_from_crate_error() {
        let err = SessionError::from(&SculptorError::Validation("busy".into()));
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.to_string(), "busy");
    }
}
