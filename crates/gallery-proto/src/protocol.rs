use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which upstream provider an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// The dog provider.
    Primary,
    /// The cat provider.
    Secondary,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Primary, SourceKind::Secondary];

    /// Short label for logs and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "dog",
            Self::Secondary => "cat",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One image in the feed.  Fields are private so an item cannot change after
/// it has been handed to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedItem {
    url: String,
    source: SourceKind,
}

impl FeedItem {
    pub fn new(url: impl Into<String>, source: SourceKind) -> Self {
        Self {
            url: url.into(),
            source,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }
}

/// Category filter applied to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    All,
    PrimaryOnly,
    SecondaryOnly,
}

impl FilterMode {
    /// True when items from `kind` belong in the feed under this filter.
    pub fn enables(&self, kind: SourceKind) -> bool {
        match self {
            Self::All => true,
            Self::PrimaryOnly => kind == SourceKind::Primary,
            Self::SecondaryOnly => kind == SourceKind::Secondary,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::PrimaryOnly => "dogs",
            Self::SecondaryOnly => "cats",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "dogs" | "dog" | "primary" => Ok(Self::PrimaryOnly),
            "cats" | "cat" | "secondary" => Ok(Self::SecondaryOnly),
            other => Err(format!("unknown filter '{other}' (expected all, dogs or cats)")),
        }
    }
}

/// Lifecycle of the full-screen viewer.
///
/// Transitions:
///   Closed -> Open -> Closing -> Closed
///   Closing -> Open (re-selected before the exit transition finished)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewerPhase {
    #[default]
    Closed,
    Open,
    Closing,
}

/// Read-only view of the feed handed to the rendering layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedSnapshot {
    /// Items in display order.  Shared with the controller: snapshots taken
    /// between two commits point at the same storage.
    pub items: Arc<Vec<FeedItem>>,
    pub loading: bool,
    pub filter: FilterMode,
    /// Epoch of the most recently started fetch round.
    pub epoch: u64,
}

/// Read-only view of the viewer handed to the rendering layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerSnapshot {
    pub selection: Option<FeedItem>,
    pub phase: ViewerPhase,
    /// Background scrolling must be suppressed while this is set.
    pub scroll_locked: bool,
}

/// Messages sent from the rendering layer to the gallery core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum GalleryCommand {
    LoadMore,
    SetFilter { mode: FilterMode },
    /// Sent after every render: can the user scroll the page yet?
    ReportViewport { scrollable: bool },
    Select { item: FeedItem },
    RequestClose,
    Shutdown,
}

/// Messages broadcast from the gallery core after each state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "update")]
pub enum GalleryUpdate {
    Feed { data: FeedSnapshot },
    Viewer { data: ViewerSnapshot },
}
