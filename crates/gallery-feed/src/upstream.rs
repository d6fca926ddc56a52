//! Upstream image providers.
//!
//! Each provider is reached with a single GET and its JSON normalised into
//! `FeedItem`s.  Normalisation is forgiving: a payload whose shape does not
//! match what we expect yields zero items rather than an error.  Only
//! transport failures, non-2xx statuses and bodies that are not JSON at all
//! become `SourceError`s.
//!
//! URLs that are not https or whose host is missing from
//! `images.allowed_hosts` are dropped too, so a batch can come back shorter
//! than the requested count.  A full page per source is only guaranteed while
//! the providers keep serving from the allowed CDN hosts; an empty allow-list
//! turns the host check off.
//!
//! ## Payloads
//!
//!   dog  `GET {primary_url}/{count}`        `{"message": ["<url>", ...], "status": "success"}`
//!   cat  `GET {secondary_url}?limit={count}` `[{"id": "..", "url": "<url>", ...}, ...]`

use std::time::Duration;

use anyhow::Context;
use futures_util::future::BoxFuture;
use gallery_proto::config::{ImagesConfig, SourcesConfig, PRIMARY_MAX_PAGE};
use gallery_proto::protocol::{FeedItem, SourceKind};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::SourceError;

/// One upstream provider.  Implementations must be stateless enough to be
/// called from several fetch rounds at once.
pub trait ImageSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch roughly `count` items, tagged with `self.kind()`.
    fn fetch_batch(&self, count: usize) -> BoxFuture<'_, Result<Vec<FeedItem>, SourceError>>;
}

pub fn build_client(config: &SourcesConfig) -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("failed to build reqwest client")
}

/// `ImageSource` backed by one of the two HTTP providers.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    kind: SourceKind,
    client: Client,
    base_url: String,
    images: ImagesConfig,
}

impl HttpImageSource {
    pub fn new(
        kind: SourceKind,
        client: Client,
        base_url: impl Into<String>,
        images: ImagesConfig,
    ) -> Self {
        Self {
            kind,
            client,
            base_url: base_url.into(),
            images,
        }
    }

    pub fn primary(client: Client, sources: &SourcesConfig, images: &ImagesConfig) -> Self {
        Self::new(
            SourceKind::Primary,
            client,
            sources.primary_url.clone(),
            images.clone(),
        )
    }

    pub fn secondary(client: Client, sources: &SourcesConfig, images: &ImagesConfig) -> Self {
        Self::new(
            SourceKind::Secondary,
            client,
            sources.secondary_url.clone(),
            images.clone(),
        )
    }

    async fn fetch(&self, count: usize) -> Result<Vec<FeedItem>, SourceError> {
        let kind = self.kind;
        let request = match kind {
            SourceKind::Primary => {
                let count = count.clamp(1, PRIMARY_MAX_PAGE);
                self.client
                    .get(format!("{}/{}", self.base_url.trim_end_matches('/'), count))
            }
            SourceKind::Secondary => self
                .client
                .get(&self.base_url)
                .query(&[("limit", count.max(1))]),
        };

        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| SourceError::Upstream { kind, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { kind, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| SourceError::Upstream { kind, source })?;
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|source| SourceError::MalformedPayload { kind, source })?;

        let items = normalize_payload(kind, &payload, &self.images);
        debug!("[{}] fetched {} items", kind, items.len());
        Ok(items)
    }
}

impl ImageSource for HttpImageSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch_batch(&self, count: usize) -> BoxFuture<'_, Result<Vec<FeedItem>, SourceError>> {
        Box::pin(self.fetch(count))
    }
}

/// Turn a provider payload into feed items, skipping anything unusable.
pub fn normalize_payload(kind: SourceKind, payload: &Value, images: &ImagesConfig) -> Vec<FeedItem> {
    let urls: Vec<&str> = match kind {
        SourceKind::Primary => match payload.get("message").and_then(Value::as_array) {
            Some(list) => list.iter().filter_map(Value::as_str).collect(),
            None => {
                debug!("[{}] payload has no `message` list; treating as empty", kind);
                Vec::new()
            }
        },
        SourceKind::Secondary => match payload.as_array() {
            Some(list) => list
                .iter()
                .filter_map(|entry| entry.get("url").and_then(Value::as_str))
                .collect(),
            None => {
                debug!("[{}] payload is not a list; treating as empty", kind);
                Vec::new()
            }
        },
    };

    urls.into_iter()
        .filter(|url| {
            let ok = is_renderable(url, images);
            if !ok {
                debug!("[{}] skipping image outside allowed hosts: {}", kind, url);
            }
            ok
        })
        .map(|url| FeedItem::new(url, kind))
        .collect()
}

fn is_renderable(url: &str, images: &ImagesConfig) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    if parsed.scheme() != "https" {
        return false;
    }
    parsed
        .host_str()
        .map(|host| images.allows_host(host))
        .unwrap_or(false)
}
