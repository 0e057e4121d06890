pub mod defs;
pub mod state;

pub use defs::{FeedItem, FeedMeta, FeedRenderer};
pub use state::{CachedResponse, ResponseCache};
