pub mod types;
pub mod traits;
pub mod rss_utils;
pub mod cache;
pub mod fetcher;
pub mod parser;
pub mod filters;
pub mod aggregator;
pub mod render;
pub mod config;
pub mod runner;

pub use types::*;
pub use traits::{ConditionalHeaders, HttpTransport};
pub use cache::{DiskResponseCache, MemoryResponseCache};
pub use fetcher::{ConditionalFetcher, ReqwestTransport};
pub use parser::{detect_format, FeedFormat, FeedParser};
pub use filters::{FeedFilter, Filter, FilterChain, FilterSpec, StageReport};
pub use aggregator::{CookReport, FeedAggregator, SourceReport};
pub use render::{AtomRenderer, JsonFeedRenderer};
pub use config::{CookerConfig, Recipe};
pub use runner::{cook_all, CookedFeed, RunOptions};
