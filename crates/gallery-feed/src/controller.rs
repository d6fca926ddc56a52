//! FeedController: owns the feed and decides which fetch results land in it.
//!
//! Every `load_more` bumps the request epoch and spawns one fetch round.  The
//! round fetches the sources enabled by the current filter concurrently,
//! absorbs per-source failures, merges what came back and sends a
//! `BatchResult` tagged with its epoch to the controller's result channel.
//!
//! Results are committed only in `apply`, on whichever task owns the
//! controller.  A result whose epoch is no longer current is discarded: a
//! newer `load_more` or a filter change superseded it.  In-flight requests are
//! never cancelled; their output is simply ignored.
//!
//! The feed grows without bound until the next filter change.

use std::sync::Arc;

use futures_util::future::join_all;
use gallery_proto::config::FeedConfig;
use gallery_proto::protocol::{FeedItem, FeedSnapshot, FilterMode, SourceKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::merge;
use crate::upstream::ImageSource;

/// Output of one fetch round, tagged with the epoch it was started under.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub epoch: u64,
    pub items: Vec<FeedItem>,
}

/// What `apply` did with a `BatchResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Appended this many items (possibly zero) and cleared the loading flag.
    Appended(usize),
    /// A newer round started after this one; nothing touched.
    StaleDiscarded { epoch: u64, current: u64 },
    /// This epoch has already been committed once.
    AlreadyCommitted { epoch: u64 },
}

/// The two upstream providers.
#[derive(Clone)]
pub struct Sources {
    primary: Arc<dyn ImageSource>,
    secondary: Arc<dyn ImageSource>,
}

impl Sources {
    pub fn new(primary: Arc<dyn ImageSource>, secondary: Arc<dyn ImageSource>) -> Self {
        Self { primary, secondary }
    }

    pub fn get(&self, kind: SourceKind) -> Arc<dyn ImageSource> {
        match kind {
            SourceKind::Primary => Arc::clone(&self.primary),
            SourceKind::Secondary => Arc::clone(&self.secondary),
        }
    }

    fn enabled_by(&self, filter: FilterMode) -> Vec<Arc<dyn ImageSource>> {
        SourceKind::ALL
            .iter()
            .filter(|kind| filter.enables(**kind))
            .map(|kind| self.get(*kind))
            .collect()
    }
}

pub struct FeedController {
    sources: Sources,
    page_size: usize,
    prefill_cap: u32,
    /// Copy-on-write: a commit only copies when a published snapshot still
    /// holds the previous page list.
    items: Arc<Vec<FeedItem>>,
    filter: FilterMode,
    /// Epoch of the most recently started round.  Never decremented.
    epoch: u64,
    /// Epoch of the most recently committed round.
    committed_epoch: u64,
    loading: bool,
    /// Automatic loads fired since the last filter change.
    prefill_used: u32,
    result_tx: mpsc::Sender<BatchResult>,
    result_rx: mpsc::Receiver<BatchResult>,
}

impl FeedController {
    pub fn new(sources: Sources, config: &FeedConfig) -> Self {
        let (result_tx, result_rx) = mpsc::channel(64);
        Self {
            sources,
            page_size: config.page_size.max(1),
            prefill_cap: config.prefill_cap,
            items: Arc::default(),
            filter: config.initial_filter,
            epoch: 0,
            committed_epoch: 0,
            loading: false,
            prefill_used: 0,
            result_tx,
            result_rx,
        }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn prefill_used(&self) -> u32 {
        self.prefill_used
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            items: Arc::clone(&self.items),
            loading: self.loading,
            filter: self.filter,
            epoch: self.epoch,
        }
    }

    /// Start a new fetch round and return its epoch.  Must be called from
    /// within a tokio runtime; the result arrives via `next_result`.
    pub fn load_more(&mut self) -> u64 {
        self.epoch += 1;
        let epoch = self.epoch;
        self.loading = true;

        let sources = self.sources.enabled_by(self.filter);
        let page_size = self.page_size;
        let result_tx = self.result_tx.clone();
        info!(
            "feed: round {} started (filter={}, sources={})",
            epoch,
            self.filter,
            sources.len()
        );

        tokio::spawn(async move {
            // A panic anywhere in the round surfaces here as a JoinError and
            // is reported as an empty batch.
            let items = match tokio::spawn(fetch_round(sources, page_size)).await {
                Ok(items) => items,
                Err(e) => {
                    error!("feed: round {} failed: {}", epoch, e);
                    Vec::new()
                }
            };
            if result_tx.send(BatchResult { epoch, items }).await.is_err() {
                debug!("feed: round {} finished after the controller was dropped", epoch);
            }
        });

        epoch
    }

    /// Switch category.  Clears the feed immediately and starts a fresh
    /// round, which also invalidates any round still in flight.
    /// Returns `false` when `mode` is already active.
    pub fn set_filter(&mut self, mode: FilterMode) -> bool {
        if mode == self.filter {
            return false;
        }
        info!("feed: filter {} -> {}", self.filter, mode);
        self.filter = mode;
        self.items = Arc::default();
        self.prefill_used = 0;
        self.load_more();
        true
    }

    /// Called after each render.  Fires one automatic load when nothing is in
    /// flight, the page cannot scroll yet and the prefill budget allows it.
    pub fn maybe_prefill(&mut self, viewport_is_scrollable: bool) -> bool {
        if self.loading || viewport_is_scrollable || self.prefill_used >= self.prefill_cap {
            return false;
        }
        self.prefill_used += 1;
        debug!(
            "feed: prefill {}/{} (feed has {} items)",
            self.prefill_used,
            self.prefill_cap,
            self.items.len()
        );
        self.load_more();
        true
    }

    /// The single commit point.
    pub fn apply(&mut self, result: BatchResult) -> CommitOutcome {
        if result.epoch != self.epoch {
            debug!(
                "feed: discarding stale round {} (current {})",
                result.epoch, self.epoch
            );
            return CommitOutcome::StaleDiscarded {
                epoch: result.epoch,
                current: self.epoch,
            };
        }
        if result.epoch == self.committed_epoch {
            debug!("feed: round {} already committed", result.epoch);
            return CommitOutcome::AlreadyCommitted {
                epoch: result.epoch,
            };
        }

        let appended = result.items.len();
        Arc::make_mut(&mut self.items).extend(result.items);
        self.committed_epoch = result.epoch;
        self.loading = false;
        info!(
            "feed: round {} appended {} items (total {})",
            result.epoch,
            appended,
            self.items.len()
        );
        CommitOutcome::Appended(appended)
    }

    /// Wait for the next finished round.
    pub async fn next_result(&mut self) -> Option<BatchResult> {
        self.result_rx.recv().await
    }

    /// Wait for the next finished round and apply it.
    pub async fn pump(&mut self) -> Option<CommitOutcome> {
        let result = self.next_result().await?;
        Some(self.apply(result))
    }
}

async fn fetch_round(sources: Vec<Arc<dyn ImageSource>>, page_size: usize) -> Vec<FeedItem> {
    let batches = join_all(
        sources
            .iter()
            .map(|source| fetch_or_empty(source.as_ref(), page_size)),
    )
    .await;
    merge::merge_random(batches)
}

async fn fetch_or_empty(source: &dyn ImageSource, count: usize) -> Vec<FeedItem> {
    match source.fetch_batch(count).await {
        Ok(items) => items,
        Err(e) => {
            warn!("feed: {} source failed, using empty batch: {}", source.kind(), e);
            Vec::new()
        }
    }
}
