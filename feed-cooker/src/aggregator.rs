use crate::fetcher::{ConditionalFetcher, ReqwestTransport};
use crate::filters::{FilterChain, StageReport};
use crate::parser::FeedParser;
use crate::types::{FeedItem, FetchConfig, ResponseCache, ResponseOrigin, Result};
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of one source within a run.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub url: String,
    pub origin: Option<ResponseOrigin>,
    /// Items produced by the normalizer, before filtering.
    pub fetched: usize,
    /// Items contributed to the merged sequence.
    pub kept: usize,
    pub stages: Vec<StageReport>,
    pub error: Option<String>,
}

impl SourceReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CookReport {
    /// Merged items, newest first.
    pub items: Vec<FeedItem>,
    /// One entry per source, in visit order.
    pub sources: Vec<SourceReport>,
}

struct Harvest {
    items: Vec<FeedItem>,
    origin: ResponseOrigin,
    fetched: usize,
    stages: Vec<StageReport>,
}

/// Fetches every source, normalizes and filters it, and merges the results
/// into one sequence sorted by pubdate.
pub struct FeedAggregator {
    fetcher: ConditionalFetcher,
    config: FetchConfig,
}

impl FeedAggregator {
    pub fn new(fetcher: ConditionalFetcher, config: FetchConfig) -> Self {
        Self { fetcher, config }
    }

    /// Aggregator talking to the network through reqwest.
    pub fn with_reqwest(config: FetchConfig, cache: Arc<dyn ResponseCache>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::new(ConditionalFetcher::new(transport, cache), config))
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Random permutation of the sources, to spread load across hosts.
    pub fn visit_order<'a>(&self, urls: &'a [String]) -> Vec<&'a str> {
        let mut order: Vec<&str> = urls.iter().map(|u| u.as_str()).collect();
        match self.config.shuffle_seed {
            Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => order.shuffle(&mut rand::rng()),
        }
        order
    }

    pub async fn cook(&self, urls: &[String], chain: &FilterChain, limit: usize) -> Vec<FeedItem> {
        self.cook_with_report(urls, chain, limit).await.items
    }

    pub async fn cook_with_report(&self, urls: &[String], chain: &FilterChain, limit: usize) -> CookReport {
        let order = self.visit_order(urls);
        let concurrency = self.config.concurrency.max(1);

        // `buffered` yields in visit order whatever the completion order
        let results: Vec<(&str, Result<Harvest>)> = stream::iter(order.into_iter().map(move |url| async move {
            (url, self.cook_source(url, chain, limit).await)
        }))
        .buffered(concurrency)
        .collect()
        .await;

        let mut items = Vec::new();
        let mut sources = Vec::with_capacity(results.len());

        for (url, result) in results {
            match result {
                Ok(harvest) => {
                    info!("{} {}/{} items", url, harvest.fetched, harvest.items.len());
                    sources.push(SourceReport {
                        url: url.to_string(),
                        origin: Some(harvest.origin),
                        fetched: harvest.fetched,
                        kept: harvest.items.len(),
                        stages: harvest.stages,
                        error: None,
                    });
                    items.extend(harvest.items);
                }
                Err(e) => {
                    error!("Skipping {}: {}", url, e);
                    sources.push(SourceReport {
                        url: url.to_string(),
                        origin: None,
                        fetched: 0,
                        kept: 0,
                        stages: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        // Stable: equal pubdates keep their concatenation order
        items.sort_by(|a, b| b.pubdate.cmp(&a.pubdate));
        info!("Final items {}", items.len());

        CookReport { items, sources }
    }

    async fn cook_source(&self, url: &str, chain: &FilterChain, limit: usize) -> Result<Harvest> {
        let fetched = self.fetcher.fetch(url).await?;

        let items = FeedParser::new().normalize(&fetched.response)?;
        let count = items.len();
        let outcome = chain.apply(url, items, limit);

        Ok(Harvest {
            items: outcome.items,
            origin: fetched.origin,
            fetched: count,
            stages: outcome.stages,
        })
    }
}
