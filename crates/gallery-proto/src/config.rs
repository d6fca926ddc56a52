use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;
use super::protocol::FilterMode;

/// The dog provider refuses to return more than this many images per call.
pub const PRIMARY_MAX_PAGE: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub images: ImagesConfig,
}

/// Upstream provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Base URL for the dog provider; the page size is appended as a path segment.
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Base URL for the cat provider; the page size is sent as `?limit=`.
    #[serde(default = "default_secondary_url")]
    pub secondary_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Images requested from each enabled source per round.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Automatic loads allowed between two filter changes while the
    /// viewport is still not scrollable.
    #[serde(default = "default_prefill_cap")]
    pub prefill_cap: u32,
    /// Category the feed opens with.
    #[serde(default)]
    pub initial_filter: FilterMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// How long the viewer stays mounted after a close request, so the exit
    /// transition can finish.
    #[serde(default = "default_close_delay_ms")]
    pub close_delay_ms: u64,
}

/// Image CDN hosts the presentation layer is able to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Empty list = allow any https host.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            secondary_url: default_secondary_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            prefill_cap: default_prefill_cap(),
            initial_filter: FilterMode::default(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            close_delay_ms: default_close_delay_ms(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

impl ImagesConfig {
    pub fn allows_host(&self, host: &str) -> bool {
        self.allowed_hosts.is_empty()
            || self
                .allowed_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }
}

fn default_primary_url() -> String {
    "https://dog.ceo/api/breeds/image/random".to_string()
}

fn default_secondary_url() -> String {
    "https://api.thecatapi.com/v1/images/search".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    concat!("gallery-feed/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_prefill_cap() -> u32 {
    5
}

fn default_close_delay_ms() -> u64 {
    200
}

fn default_allowed_hosts() -> Vec<String> {
    [
        "images.dog.ceo",
        "cdn.thedogapi.com",
        "cdn.thecatapi.com",
        "cdn2.thecatapi.com",
        "media.thedogapi.com",
        "media.thecatapi.com",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config.validated())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Clamp values the providers cannot serve.
    pub fn validated(mut self) -> Self {
        self.feed.page_size = self.feed.page_size.clamp(1, PRIMARY_MAX_PAGE);
        self
    }
}
