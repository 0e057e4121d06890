use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical item produced by the normalizers and consumed by filters and renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub unique_id: String,
    /// Best-effort text, empty when the source has neither content nor summary.
    pub description: String,
    pub content: Option<String>,
    pub author_name: Option<String>,
    pub author_link: Option<String>,
    pub author_email: Option<String>,
    /// Always set; undated entries carry the time they were normalized.
    pub pubdate: DateTime<Utc>,
    pub update: Option<DateTime<Utc>>,
}

impl FeedItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>, unique_id: impl Into<String>, pubdate: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            unique_id: unique_id.into(),
            description: String::new(),
            content: None,
            author_name: None,
            author_link: None,
            author_email: None,
            pubdate,
            update: None,
        }
    }
}

/// Metadata of a cooked output feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    pub home_page_url: String,
    pub feed_url: String,
    pub author_name: String,
    pub author_link: String,
}

// Object style note:
// Renderers are pure: the same metadata and item slice always produce the
// same document, and they never reorder or drop items.

pub trait FeedRenderer {
    /// File extension of the produced document, without the dot.
    fn extension(&self) -> &'static str;
    fn render(&self, meta: &FeedMeta, items: &[FeedItem]) -> anyhow::Result<String>;
}
