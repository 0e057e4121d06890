use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Last successful HTTP response for a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
    pub encoding: String,
}

/// Key-value store of cached responses keyed by URL.
///
/// Entries are written after every 2xx fetch and never deleted, so the
/// last known good response is always available as a fallback.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn load(&self, url: &str) -> anyhow::Result<Option<CachedResponse>>;
    async fn save(&self, url: &str, response: &CachedResponse) -> anyhow::Result<()>;
}
