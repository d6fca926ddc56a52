//! GalleryCore: single-owner event loop for all mutable gallery state.
//!
//! The core owns the `FeedController` and the `Viewer` exclusively.  The
//! rendering layer talks to it through a `GalleryHandle`: commands go in over
//! an mpsc channel, and after every state change the core broadcasts a
//! `GalleryUpdate` carrying a fresh snapshot.  Finished fetch rounds and
//! viewer close timers are multiplexed with commands in the same loop, so
//! every commit happens on this one task.

use anyhow::anyhow;
use gallery_proto::config::Config;
use gallery_proto::protocol::{FeedItem, FilterMode, GalleryCommand, GalleryUpdate};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::controller::{BatchResult, CommitOutcome, FeedController, Sources};
use crate::viewer::{CloseElapsed, Viewer};

// ── CoreEvent ─────────────────────────────────────────────────────────────────

enum CoreEvent {
    Command(Option<GalleryCommand>),
    Batch(BatchResult),
    CloseElapsed(CloseElapsed),
}

// ── GalleryHandle ─────────────────────────────────────────────────────────────

/// Rendering-layer side of the core: the only way to mutate gallery state.
#[derive(Clone)]
pub struct GalleryHandle {
    command_tx: mpsc::Sender<GalleryCommand>,
    broadcast_tx: broadcast::Sender<GalleryUpdate>,
}

impl GalleryHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<GalleryUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub async fn send(&self, command: GalleryCommand) -> anyhow::Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| anyhow!("gallery core has stopped"))
    }

    pub async fn load_more(&self) -> anyhow::Result<()> {
        self.send(GalleryCommand::LoadMore).await
    }

    pub async fn set_filter(&self, mode: FilterMode) -> anyhow::Result<()> {
        self.send(GalleryCommand::SetFilter { mode }).await
    }

    pub async fn report_viewport(&self, scrollable: bool) -> anyhow::Result<()> {
        self.send(GalleryCommand::ReportViewport { scrollable }).await
    }

    pub async fn select(&self, item: FeedItem) -> anyhow::Result<()> {
        self.send(GalleryCommand::Select { item }).await
    }

    pub async fn request_close(&self) -> anyhow::Result<()> {
        self.send(GalleryCommand::RequestClose).await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send(GalleryCommand::Shutdown).await
    }
}

/// Build a core, spawn its loop and return a handle plus a receiver that is
/// subscribed before the first update goes out.
pub fn start(
    config: &Config,
    sources: Sources,
) -> (GalleryHandle, broadcast::Receiver<GalleryUpdate>, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(256);
    let (broadcast_tx, broadcast_rx) = broadcast::channel(256);

    let core = GalleryCore::new(config, sources, broadcast_tx.clone());
    let task = tokio::spawn(core.run(command_rx));

    let handle = GalleryHandle {
        command_tx,
        broadcast_tx,
    };
    (handle, broadcast_rx, task)
}

// ── GalleryCore ───────────────────────────────────────────────────────────────

pub struct GalleryCore {
    feed: FeedController,
    viewer: Viewer,
    broadcast_tx: broadcast::Sender<GalleryUpdate>,
}

impl GalleryCore {
    pub fn new(
        config: &Config,
        sources: Sources,
        broadcast_tx: broadcast::Sender<GalleryUpdate>,
    ) -> Self {
        Self {
            feed: FeedController::new(sources, &config.feed),
            viewer: Viewer::new(&config.viewer),
            broadcast_tx,
        }
    }

    /// Run until `Shutdown` arrives or every handle has been dropped.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<GalleryCommand>) {
        info!("GalleryCore: starting event loop");

        // The page opens with content.
        self.feed.load_more();
        self.publish_feed();

        loop {
            let event = tokio::select! {
                command = command_rx.recv() => CoreEvent::Command(command),
                Some(batch) = self.feed.next_result() => CoreEvent::Batch(batch),
                Some(elapsed) = self.viewer.next_close() => CoreEvent::CloseElapsed(elapsed),
            };

            match event {
                CoreEvent::Command(None) => {
                    info!("GalleryCore: command channel closed, shutting down");
                    break;
                }
                CoreEvent::Command(Some(GalleryCommand::Shutdown)) => {
                    info!("GalleryCore: shutdown requested");
                    break;
                }
                CoreEvent::Command(Some(command)) => self.handle_command(command),
                CoreEvent::Batch(batch) => match self.feed.apply(batch) {
                    CommitOutcome::Appended(_) => self.publish_feed(),
                    CommitOutcome::StaleDiscarded { .. } | CommitOutcome::AlreadyCommitted { .. } => {}
                },
                CoreEvent::CloseElapsed(elapsed) => {
                    if self.viewer.complete_close(elapsed) {
                        self.publish_viewer();
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, command: GalleryCommand) {
        debug!("GalleryCore: command {:?}", command);
        match command {
            GalleryCommand::LoadMore => {
                self.feed.load_more();
                self.publish_feed();
            }
            GalleryCommand::SetFilter { mode } => {
                if self.feed.set_filter(mode) {
                    self.publish_feed();
                }
            }
            GalleryCommand::ReportViewport { scrollable } => {
                if self.feed.maybe_prefill(scrollable) {
                    self.publish_feed();
                }
            }
            GalleryCommand::Select { item } => {
                self.viewer.select(item);
                self.publish_viewer();
            }
            GalleryCommand::RequestClose => {
                if self.viewer.request_close() {
                    self.publish_viewer();
                }
            }
            GalleryCommand::Shutdown => {}
        }
    }

    fn publish_feed(&self) {
        // No receivers is fine.
        let _ = self.broadcast_tx.send(GalleryUpdate::Feed {
            data: self.feed.snapshot(),
        });
    }

    fn publish_viewer(&self) {
        let _ = self.broadcast_tx.send(GalleryUpdate::Viewer {
            data: self.viewer.snapshot(),
        });
    }
}
