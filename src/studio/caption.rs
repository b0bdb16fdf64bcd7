//! Rotating progress caption scoped to an in-flight request.

use crate::studio::state::SessionCell;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Rotates `SessionState::caption` until dropped.
///
/// Dropping the ticker stops the task and clears the caption, so every exit
/// from `Generating`/`Refining` tears it down, including early returns.
pub(crate) struct CaptionTicker {
    cell: Arc<SessionCell>,
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl CaptionTicker {
    pub(crate) fn start(
        cell: Arc<SessionCell>,
        epoch: u64,
        captions: &[String],
        interval: Duration,
    ) -> Self {
        if captions.is_empty() || interval.is_zero() {
            return Self {
                cell,
                epoch,
                handle: None,
            };
        }

        let first = captions[0].clone();
        cell.update_if(epoch, |s| s.caption = Some(first));

        let captions = captions.to_vec();
        let task_cell = Arc::clone(&cell);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            let mut index = 0;
            loop {
                ticker.tick().await;
                index = (index + 1) % captions.len();
                let caption = captions[index].clone();
                if !task_cell.update_if(epoch, |s| s.caption = Some(caption)) {
                    tracing::debug!(epoch, "caption ticker outlived its request");
                    break;
                }
            }
        });

        Self {
            cell,
            epoch,
            handle: Some(handle),
        }
    }
}

impl Drop for CaptionTicker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.cell.update_if(self.epoch, |s| s.caption = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captions() -> Vec<String> {
        vec!["one".into(), "two".into()]
    }

    #[tokio::test]
    async fn test_first_caption_is_immediate_and_cleared_on_drop() {
        let cell = Arc::new(SessionCell::new());
        let ticker = CaptionTicker::start(cell.clone(), 0, &captions(), Duration::from_secs(60));
        assert_eq!(cell.snapshot().caption.as_deref(), Some("one"));

        drop(ticker);
        assert_eq!(cell.snapshot().caption, None);
    }

    #[tokio::test]
    async fn test_caption_rotates() {
        let cell = Arc::new(SessionCell::new());
        let mut rx = cell.subscribe();
        let _ticker = CaptionTicker::start(cell.clone(), 0, &captions(), Duration::from_millis(10));

        let seen = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.caption.as_deref() == Some("two")),
        )
        .await
        .map(|r| r.is_ok());
        assert!(matches!(seen, Ok(true)));
    }

    #[tokio::test]
    async fn test_stale_ticker_leaves_state_alone() {
        let cell = Arc::new(SessionCell::new());
        cell.lock().epoch = 5;

        let ticker = CaptionTicker::start(cell.clone(), 4, &captions(), Duration::from_millis(5));
        assert_eq!(cell.snapshot().caption, None);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cell.snapshot().caption, None);
        drop(ticker);
    }

    #[tokio::test]
    async fn test_disabled_without_captions() {
        let cell = Arc::new(SessionCell::new());
        let ticker = CaptionTicker::start(cell.clone(), 0, &[], Duration::from_millis(5));
        assert!(ticker.handle.is_none());
        assert_eq!(cell.snapshot().caption, None);
    }
}
