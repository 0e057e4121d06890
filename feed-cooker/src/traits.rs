use crate::types::{CachedResponse, TransportError};
use async_trait::async_trait;

/// Revalidation headers derived from a cached response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

impl ConditionalHeaders {
    pub fn from_cached(cached: Option<&CachedResponse>) -> Self {
        match cached {
            Some(cached) => Self {
                if_none_match: cached.etag.clone(),
                if_modified_since: cached.last_modified.clone(),
            },
            None => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.if_none_match.is_none() && self.if_modified_since.is_none()
    }
}

/// A single HTTP GET, without any retry or cache logic.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Returns the response for any status code; only transport-level
    /// failures (timeout, connection, body decoding) are errors.
    async fn get(
        &self,
        url: &str,
        conditional: &ConditionalHeaders,
    ) -> std::result::Result<CachedResponse, TransportError>;
}
