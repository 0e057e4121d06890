#![allow(dead_code)]

use async_trait::async_trait;
use feed_cooker::{
    CachedResponse, ConditionalFetcher, ConditionalHeaders, FeedAggregator, FetchConfig,
    HttpTransport, MemoryResponseCache, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const RSS: &str = "application/rss+xml; charset=utf-8";
pub const ATOM: &str = "application/atom+xml";
pub const JSON: &str = "application/json";

/// Transport replaying queued outcomes per URL and recording every request.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Result<CachedResponse, TransportError>>>>,
    requests: Mutex<Vec<(String, ConditionalHeaders)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, outcome: Result<CachedResponse, TransportError>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn ok(&self, url: &str, content_type: &str, body: &str) -> &Self {
        self.respond(url, Ok(response(url, 200, content_type, body)))
    }

    pub fn status(&self, url: &str, status: u16) -> &Self {
        self.respond(url, Ok(response(url, status, "text/html", "")))
    }

    pub fn timeout(&self, url: &str) -> &Self {
        self.respond(url, Err(TransportError::Timeout))
    }

    pub fn requests(&self) -> Vec<(String, ConditionalHeaders)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|(u, _)| u == url).count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        conditional: &ConditionalHeaders,
    ) -> Result<CachedResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), conditional.clone()));

        self.script
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(TransportError::Connect(format!("no route to {}", url))))
    }
}

pub fn response(url: &str, status: u16, content_type: &str, body: &str) -> CachedResponse {
    CachedResponse {
        url: url.to_string(),
        status,
        etag: Some(format!("\"{}\"", body.len())),
        last_modified: Some("Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
        content_type: Some(content_type.to_string()),
        body: body.to_string(),
        encoding: "utf-8".to_string(),
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub cache: Arc<MemoryResponseCache>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            transport: Arc::new(ScriptedTransport::new()),
            cache: Arc::new(MemoryResponseCache::new()),
        }
    }

    pub fn fetcher(&self) -> ConditionalFetcher {
        ConditionalFetcher::new(self.transport.clone(), self.cache.clone())
    }

    pub fn aggregator(&self, seed: u64) -> FeedAggregator {
        self.aggregator_with(FetchConfig {
            shuffle_seed: Some(seed),
            ..FetchConfig::default()
        })
    }

    pub fn aggregator_with(&self, config: FetchConfig) -> FeedAggregator {
        FeedAggregator::new(self.fetcher(), config)
    }
}

/// RSS 2.0 document; items are (title, link, pubDate).
pub fn rss(channel_title: &str, items: &[(&str, &str, Option<&str>)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link, date)| {
            let date = date
                .map(|d| format!("<pubDate>{}</pubDate>", d))
                .unwrap_or_default();
            format!(
                "<item><title>{}</title><link>{}</link><guid>{}</guid>{}<description>About {}</description></item>",
                title, link, link, date, title
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{}</title>
    <link>https://example.com/</link>
    <description>test channel</description>
    {}
  </channel>
</rss>"#,
        channel_title, items
    )
}
