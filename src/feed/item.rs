use crate::config::FeedConfig;
use crate::error::{ReelcamError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// A single entry of the short-form feed. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, alias = "likes", skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde(default, alias = "shares", skip_serializing_if = "Option::is_none")]
    pub share_count: Option<u64>,
}

impl VideoItem {
    pub fn new<I: Into<String>, U: Into<String>>(id: I, uri: U) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            title: None,
            user: None,
            like_count: None,
            share_count: None,
        }
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_counts(mut self, likes: u64, shares: u64) -> Self {
        self.like_count = Some(likes);
        self.share_count = Some(shares);
        self
    }

    /// Caption overlay lines: `@user` first, then the title
    pub fn caption_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(user) = &self.user {
            lines.push(format!("@{}", user));
        }
        if let Some(title) = &self.title {
            lines.push(title.clone());
        }
        lines
    }
}

const SAMPLE_BUCKET: &str = "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample";

/// Built-in catalogue used when no feed file is configured
pub fn sample_catalogue() -> Vec<VideoItem> {
    let entries: [(&str, &str, &str, &str, u64, u64); 6] = [
        ("1", "ForBiggerFun.mp4", "For Bigger Fun", "google", 1200, 300),
        ("2", "ElephantsDream.mp4", "Elephants Dream", "blenderfoundation", 25000, 1200),
        ("3", "BigBuckBunny.mp4", "Big Buck Bunny", "blenderfoundation", 150000, 8000),
        ("4", "ForBiggerBlazes.mp4", "For Bigger Blazes", "google", 980, 150),
        ("5", "ForBiggerEscapes.mp4", "For Bigger Escapes", "google", 7500, 450),
        ("6", "Sintel.mp4", "Sintel", "blenderfoundation", 95000, 3200),
    ];

    entries
        .iter()
        .map(|(id, file, title, user, likes, shares)| {
            VideoItem::new(*id, format!("{}/{}", SAMPLE_BUCKET, file))
                .with_title(*title)
                .with_user(*user)
                .with_counts(*likes, *shares)
        })
        .collect()
}

/// Load feed items from a JSON array file
pub fn load_feed_file<P: AsRef<Path>>(path: P) -> Result<Vec<VideoItem>> {
    let path = path.as_ref();
    debug!("Loading feed items from: {}", path.display());

    let contents = std::fs::read_to_string(path)?;
    let items: Vec<VideoItem> = serde_json::from_str(&contents)?;
    validate_items(&items)?;

    info!("Loaded {} feed items from {}", items.len(), path.display());
    Ok(items)
}

/// Resolve the feed items for a configuration
pub fn load_feed(config: &FeedConfig) -> Result<Vec<VideoItem>> {
    match &config.source {
        Some(path) => load_feed_file(path),
        None => Ok(sample_catalogue()),
    }
}

/// Ids must be non-empty and unique; list order is display order
pub fn validate_items(items: &[VideoItem]) -> Result<()> {
    let mut seen = HashSet::new();
    for item in items {
        if item.id.trim().is_empty() {
            return Err(ReelcamError::component("feed", "Feed item with empty id"));
        }
        if !seen.insert(item.id.as_str()) {
            return Err(ReelcamError::component(
                "feed",
                format!("Duplicate feed item id: {}", item.id),
            ));
        }
    }
    Ok(())
}
