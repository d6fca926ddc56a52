use gallery_proto::protocol::SourceKind;
use thiserror::Error;

/// Failure fetching one page from one upstream provider.
///
/// None of these escape the feed controller: a failed source contributes an
/// empty batch for that round.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{kind} source request failed: {source}")]
    Upstream {
        kind: SourceKind,
        source: reqwest::Error,
    },
    #[error("{kind} source returned status {status}")]
    Status {
        kind: SourceKind,
        status: reqwest::StatusCode,
    },
    #[error("{kind} source returned a malformed payload: {source}")]
    MalformedPayload {
        kind: SourceKind,
        source: serde_json::Error,
    },
    #[error("{kind} source unavailable: {reason}")]
    Unavailable { kind: SourceKind, reason: String },
}

impl SourceError {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Upstream { kind, .. }
            | Self::Status { kind, .. }
            | Self::MalformedPayload { kind, .. }
            | Self::Unavailable { kind, .. } => *kind,
        }
    }
}
