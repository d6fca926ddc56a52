//! Viewer: open/close lifecycle of the full-screen image view.
//!
//! `request_close` moves to `Closing` at once and schedules the completion
//! (`Closed`, selection cleared) after `close_delay`, so the image stays
//! mounted for its exit transition.  Each close request carries a token; a
//! completion whose token is no longer current (the viewer was re-opened in
//! the meantime) does nothing.

use std::time::Duration;

use gallery_proto::config::ViewerConfig;
use gallery_proto::protocol::{FeedItem, ViewerPhase, ViewerSnapshot};
use tokio::sync::mpsc;
use tracing::debug;

/// Fired by the delayed completion task of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseElapsed {
    pub token: u64,
}

pub struct Viewer {
    selection: Option<FeedItem>,
    phase: ViewerPhase,
    close_token: u64,
    close_delay: Duration,
    close_tx: mpsc::Sender<CloseElapsed>,
    close_rx: mpsc::Receiver<CloseElapsed>,
}

impl Viewer {
    pub fn new(config: &ViewerConfig) -> Self {
        let (close_tx, close_rx) = mpsc::channel(16);
        Self {
            selection: None,
            phase: ViewerPhase::Closed,
            close_token: 0,
            close_delay: Duration::from_millis(config.close_delay_ms),
            close_tx,
            close_rx,
        }
    }

    pub fn selection(&self) -> Option<&FeedItem> {
        self.selection.as_ref()
    }

    pub fn phase(&self) -> ViewerPhase {
        self.phase
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        ViewerSnapshot {
            selection: self.selection.clone(),
            phase: self.phase,
            scroll_locked: self.phase == ViewerPhase::Open,
        }
    }

    /// Show `item`.  Replaces the current item when already open, and
    /// re-opens (cancelling the pending completion) when closing.
    pub fn select(&mut self, item: FeedItem) {
        if self.phase == ViewerPhase::Closing {
            self.close_token += 1;
        }
        debug!("viewer: open {}", item.url());
        self.selection = Some(item);
        self.phase = ViewerPhase::Open;
    }

    /// Begin closing.  No-op unless open.  Must be called from within a
    /// tokio runtime; the completion arrives via `next_close`.
    pub fn request_close(&mut self) -> bool {
        if self.phase != ViewerPhase::Open {
            return false;
        }
        self.phase = ViewerPhase::Closing;
        self.close_token += 1;
        let token = self.close_token;
        let delay = self.close_delay;
        let close_tx = self.close_tx.clone();
        debug!("viewer: closing (token {})", token);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if close_tx.send(CloseElapsed { token }).await.is_err() {
                debug!("viewer: close {} elapsed after the viewer was dropped", token);
            }
        });
        true
    }

    /// Finish a close request.  Returns `true` if the viewer actually closed.
    pub fn complete_close(&mut self, elapsed: CloseElapsed) -> bool {
        if elapsed.token != self.close_token || self.phase != ViewerPhase::Closing {
            debug!(
                "viewer: ignoring superseded close (token {}, current {})",
                elapsed.token, self.close_token
            );
            return false;
        }
        self.phase = ViewerPhase::Closed;
        self.selection = None;
        debug!("viewer: closed");
        true
    }

    pub async fn next_close(&mut self) -> Option<CloseElapsed> {
        self.close_rx.recv().await
    }

    /// Wait for the next pending completion and apply it.
    pub async fn pump(&mut self) -> Option<bool> {
        let elapsed = self.next_close().await?;
        Some(self.complete_close(elapsed))
    }
}
