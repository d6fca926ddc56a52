//! Headless gallery session: drives the feed against the real providers the
//! way a browser page would and prints what ended up in the feed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gallery_feed::controller::Sources;
use gallery_feed::upstream::{build_client, HttpImageSource};
use gallery_proto::config::Config;
use gallery_proto::protocol::{FeedSnapshot, FilterMode, GalleryUpdate, SourceKind};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "gallery-feed", about = "Fetch a few pages of the dog/cat image feed")]
struct Args {
    /// Pages to load once the viewport has been filled.
    #[arg(long, default_value_t = 3)]
    pages: usize,

    /// Category filter: all, dogs or cats (defaults to `feed.initial_filter`).
    #[arg(long)]
    filter: Option<FilterMode>,

    /// Items that fit on screen before the page becomes scrollable.
    #[arg(long, default_value_t = 40)]
    viewport: usize,

    /// Config file (defaults to the per-user config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log to stderr instead of the log file.
    #[arg(long)]
    stderr: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(log_path) = gallery_feed::logging::init(args.stderr)? {
        // Print log path to stderr so the operator can tail it immediately.
        eprintln!("gallery log: {}", log_path.display());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(filter) = args.filter {
        config.feed.initial_filter = filter;
    }
    let filter = config.feed.initial_filter;
    info!("gallery-feed starting (filter={}, pages={})", filter, args.pages);

    let client = build_client(&config.sources)?;
    let sources = Sources::new(
        Arc::new(HttpImageSource::primary(client.clone(), &config.sources, &config.images)),
        Arc::new(HttpImageSource::secondary(client, &config.sources, &config.images)),
    );

    // The core's first round already runs under the requested filter.
    let (handle, mut updates, core_task) = gallery_feed::core::start(&config, sources);

    let mut pages_loaded = 0;
    let mut prefills = 0;
    let mut last = FeedSnapshot::default();
    loop {
        let snapshot = match updates.recv().await {
            Ok(GalleryUpdate::Feed { data }) => data,
            Ok(GalleryUpdate::Viewer { .. }) => continue,
            Err(RecvError::Lagged(n)) => {
                warn!("missed {} updates", n);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if snapshot.loading || snapshot.filter != filter {
            continue;
        }
        last = snapshot;

        // Every settled update is a "render": let the prefill loop run first,
        // then page like a user scrolling to the bottom.
        let scrollable = last.items.len() > args.viewport;
        if !scrollable && prefills < config.feed.prefill_cap {
            prefills += 1;
            handle.report_viewport(false).await?;
            continue;
        }
        if pages_loaded >= args.pages {
            break;
        }
        pages_loaded += 1;
        handle.load_more().await?;
    }

    handle.shutdown().await?;
    core_task.await?;

    let dogs = count(&last, SourceKind::Primary);
    let cats = count(&last, SourceKind::Secondary);
    println!(
        "{} images ({} dogs, {} cats) after {} rounds [filter: {}]",
        last.items.len(),
        dogs,
        cats,
        last.epoch,
        last.filter
    );
    for item in last.items.iter() {
        println!("{:>3}  {}", item.source().label(), item.url());
    }
    Ok(())
}

fn count(snapshot: &FeedSnapshot, kind: SourceKind) -> usize {
    snapshot.items.iter().filter(|i| i.source() == kind).count()
}
