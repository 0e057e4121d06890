// Core types live in the interfaces crate
pub use interfaces::defs::{FeedItem, FeedMeta, FeedRenderer};
pub use interfaces::state::{CachedResponse, ResponseCache};

pub const DEFAULT_USER_AGENT: &str = "feedcooker 0.1";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_ENCODING: &str = "utf-8";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Number of sources fetched at once. 1 keeps the run strictly sequential.
    pub concurrency: usize,
    /// Fixes the source visit order; a fresh random order is used when unset.
    pub shuffle_seed: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            concurrency: 1,
            shuffle_seed: None,
        }
    }
}

/// Where the response handed to the normalizer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOrigin {
    /// Fresh 2xx response, already written to the cache.
    Network,
    /// 304 revalidation of the cached response.
    NotModified,
    /// Network attempt failed, last known good response reused.
    StaleCache,
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub response: CachedResponse,
    pub origin: ResponseOrigin,
}

/// Failure of a single network attempt, before any cache fallback.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CookerError {
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CookerError {
    /// Timeouts, connection failures and unusable statuses with nothing cached.
    pub fn is_transient(&self) -> bool {
        matches!(self, CookerError::Fetch { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, CookerError::Parse(_))
    }

    /// Errors that stop the whole run instead of a single source.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CookerError::Config(_) | CookerError::Toml(_))
    }
}

pub type Result<T> = std::result::Result<T, CookerError>;
