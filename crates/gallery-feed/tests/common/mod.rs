#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use gallery_feed::controller::{FeedController, Sources};
use gallery_feed::error::SourceError;
use gallery_feed::upstream::ImageSource;
use gallery_proto::config::FeedConfig;
use gallery_proto::protocol::{FeedItem, SourceKind};
use tokio::sync::{oneshot, Notify};

pub type Reply = Result<Vec<FeedItem>, String>;

enum Step {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
    Panic,
}

/// `ImageSource` that plays back a script, one step per call.  When the
/// script runs dry it generates items: `count` of them, or none for
/// `ScriptedSource::empty`.
pub struct ScriptedSource {
    kind: SourceKind,
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    generated: AtomicUsize,
    generate: bool,
    called: Notify,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind) -> Arc<Self> {
        Arc::new(Self::build(kind, true))
    }

    pub fn empty(kind: SourceKind) -> Arc<Self> {
        Arc::new(Self::build(kind, false))
    }

    fn build(kind: SourceKind, generate: bool) -> Self {
        Self {
            kind,
            steps: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            generated: AtomicUsize::new(0),
            generate,
            called: Notify::new(),
        }
    }

    fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Next call returns `n` fresh items; they are returned here too.
    pub fn push_ready(&self, n: usize) -> Vec<FeedItem> {
        let batch = items(self.kind, "ready", self.generated.fetch_add(n, Ordering::SeqCst), n);
        self.push(Step::Ready(Ok(batch.clone())));
        batch
    }

    pub fn push_failure(&self, reason: &str) {
        self.push(Step::Ready(Err(reason.to_string())));
    }

    /// Next call blocks until the returned sender is used (or dropped, which
    /// fails the call).
    pub fn push_gate(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.push(Step::Gated(rx));
        tx
    }

    pub fn push_panic(&self) {
        self.push(Step::Panic);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until `fetch_batch` has been called at least `n` times.
    pub async fn wait_for_calls(&self, n: usize) {
        within(async {
            loop {
                let notified = self.called.notified();
                if self.calls() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await;
    }
}

impl ImageSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch_batch(&self, count: usize) -> BoxFuture<'_, Result<Vec<FeedItem>, SourceError>> {
        let step = self.steps.lock().unwrap().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_waiters();

        let kind = self.kind;
        let unavailable = move |reason: String| SourceError::Unavailable { kind, reason };
        Box::pin(async move {
            match step {
                None if self.generate => Ok(items(
                    kind,
                    "auto",
                    self.generated.fetch_add(count, Ordering::SeqCst),
                    count,
                )),
                None => Ok(Vec::new()),
                Some(Step::Ready(reply)) => reply.map_err(unavailable),
                Some(Step::Gated(rx)) => match rx.await {
                    Ok(reply) => reply.map_err(unavailable),
                    Err(_) => Err(unavailable("gate dropped".to_string())),
                },
                Some(Step::Panic) => panic!("scripted {} source panicked", kind),
            }
        })
    }
}

/// `n` distinct items: `https://img.test/<kind>/<tag>/<start + i>`.
pub fn items(kind: SourceKind, tag: &str, start: usize, n: usize) -> Vec<FeedItem> {
    (start..start + n)
        .map(|i| FeedItem::new(format!("https://img.test/{}/{}/{}", kind.label(), tag, i), kind))
        .collect()
}

pub fn controller(
    primary: &Arc<ScriptedSource>,
    secondary: &Arc<ScriptedSource>,
    config: &FeedConfig,
) -> FeedController {
    let primary: Arc<dyn ImageSource> = primary.clone();
    let secondary: Arc<dyn ImageSource> = secondary.clone();
    FeedController::new(Sources::new(primary, secondary), config)
}

pub fn sorted_urls<'a>(items: impl IntoIterator<Item = &'a FeedItem>) -> Vec<String> {
    let mut urls: Vec<String> = items.into_iter().map(|i| i.url().to_string()).collect();
    urls.sort();
    urls
}

/// Await `fut`, failing the test if it takes longer than five seconds.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}
