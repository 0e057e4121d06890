use crate::filters::{FilterChain, FilterSpec};
use crate::rss_utils::url::is_http_url;
use crate::types::{CookerError, FeedMeta, FetchConfig, Result, DEFAULT_USER_AGENT, DEFAULT_TIMEOUT_SECONDS};
use serde::Deserialize;
use std::path::Path;
use url::Url;

pub const DEFAULT_DESCRIPTION: &str = "Auto generated by feedcooker with love.";
pub const DEFAULT_LIMIT: usize = 20;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CookerConfig {
    pub repository_owner: Option<String>,
    /// `owner/name` of the repository publishing the cooked feeds.
    pub repository: Option<String>,
    /// Per-source item limit, unless a recipe overrides it.
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub user_agent: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub feeds: Vec<Recipe>,
}

/// One cooked feed: its sources, filters and limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub name: String,
    pub description: Option<String>,
    pub urls: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    pub limit: Option<usize>,
}

impl CookerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: CookerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CookerError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            return Err(CookerError::Config("No feeds configured".to_string()));
        }
        if self.limit == 0 {
            return Err(CookerError::Config("limit must be greater than zero".to_string()));
        }
        if self.concurrency == Some(0) {
            return Err(CookerError::Config("concurrency must be greater than zero".to_string()));
        }

        let mut names = std::collections::HashSet::new();
        for recipe in &self.feeds {
            recipe.validate()?;
            if !names.insert(recipe.name.as_str()) {
                return Err(CookerError::Config(format!("Duplicate feed name '{}'", recipe.name)));
            }
        }
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout_seconds: self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            concurrency: self.concurrency.unwrap_or(1),
            shuffle_seed: None,
        }
    }

    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.feeds.iter().find(|r| r.name == name)
    }
}

impl Recipe {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CookerError::Config("Feed name must not be empty".to_string()));
        }
        let urls = self.source_urls()?;
        if let Some(bad) = urls.iter().find(|u| !is_http_url(u)) {
            return Err(CookerError::Config(format!(
                "Feed '{}' has a non-HTTP source url: {}",
                self.name, bad
            )));
        }
        if self.limit == Some(0) {
            return Err(CookerError::Config(format!("Feed '{}' has a zero limit", self.name)));
        }
        // Surface unknown filter kinds and bad parameters at startup
        self.filter_chain()?;
        Ok(())
    }

    /// Source list; a recipe without one cannot be cooked.
    pub fn source_urls(&self) -> Result<&[String]> {
        match self.urls.as_deref() {
            Some(urls) if !urls.is_empty() => Ok(urls),
            _ => Err(CookerError::Config(format!("Feed '{}' has no source urls", self.name))),
        }
    }

    pub fn effective_limit(&self, default: usize) -> usize {
        self.limit.unwrap_or(default)
    }

    pub fn filter_chain(&self) -> Result<FilterChain> {
        FilterChain::from_specs(&self.filters)
    }

    /// File name of the cooked feed without extension; path separators are
    /// replaced so the output never leaves its directory.
    pub fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect()
    }

    /// Output feed metadata; links point at the publishing GitHub repository.
    pub fn meta(&self, repository_owner: &str, repository: &str) -> Result<FeedMeta> {
        let repository = repository.trim_matches('/');
        if repository.split('/').filter(|s| !s.is_empty()).count() != 2 {
            return Err(CookerError::Config(format!(
                "repository must look like owner/name, got '{}'",
                repository
            )));
        }

        let home_page_url = Url::parse("https://github.com/")?.join(repository)?;

        let mut feed_url = Url::parse("https://raw.githubusercontent.com/")?;
        feed_url
            .path_segments_mut()
            .map_err(|_| CookerError::Config("Cannot build feed url".to_string()))?
            .clear()
            .extend(repository.split('/'))
            .extend(["deploy", "well-done"])
            .push(&format!("{}.json", self.file_stem()));

        let description = self
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);

        Ok(FeedMeta {
            title: self.name.clone(),
            description: description.to_string(),
            home_page_url: home_page_url.to_string(),
            feed_url: feed_url.to_string(),
            author_name: repository_owner.to_string(),
            author_link: format!("https://github.com/{}", repository_owner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        repository_owner = "someone"
        repository = "someone/feeds"
        limit = 15

        [[feeds]]
        name = "Crypto News"
        urls = ["https://newsletter.example.com/feed", "https://www.jsonfeed.org/feed.json"]

        [[feeds.filters]]
        kind = "exclude_keywords"
        keywords = ["sponsored"]

        [[feeds]]
        name = "Blogs"
        description = "Friends"
        limit = 5
        urls = ["https://vitalik.example/feed.xml"]
    "#;

    #[test]
    fn parses_recipes_with_filters() {
        let config = CookerConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.limit, 15);

        let crypto = config.recipe("Crypto News").unwrap();
        assert_eq!(crypto.source_urls().unwrap().len(), 2);
        assert_eq!(crypto.filter_chain().unwrap().len(), 1);
        assert_eq!(crypto.effective_limit(config.limit), 15);
        assert_eq!(config.recipe("Blogs").unwrap().effective_limit(config.limit), 5);

        let fetch = config.fetch_config();
        assert_eq!(fetch.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(fetch.timeout_seconds, 5);
        assert_eq!(fetch.concurrency, 1);
    }

    #[test]
    fn missing_source_list_is_fatal() {
        let err = CookerConfig::from_toml_str(
            r#"
            [[feeds]]
            name = "Empty"
            "#,
        )
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("no source urls"));

        let err = CookerConfig::from_toml_str(
            r#"
            [[feeds]]
            name = "Empty"
            urls = []
            "#,
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn unknown_filter_kind_is_fatal() {
        let err = CookerConfig::from_toml_str(
            r#"
            [[feeds]]
            name = "X"
            urls = ["https://a.example/feed"]
            [[feeds.filters]]
            kind = "magic"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CookerError::Config(_)));
    }

    #[test]
    fn meta_derives_repository_links() {
        let config = CookerConfig::from_toml_str(SAMPLE).unwrap();
        let meta = config.recipe("Crypto News").unwrap().meta("someone", "someone/feeds").unwrap();

        assert_eq!(meta.title, "Crypto News");
        assert_eq!(meta.description, DEFAULT_DESCRIPTION);
        assert_eq!(meta.home_page_url, "https://github.com/someone/feeds");
        assert_eq!(
            meta.feed_url,
            "https://raw.githubusercontent.com/someone/feeds/deploy/well-done/Crypto%20News.json"
        );
        assert_eq!(meta.author_link, "https://github.com/someone");

        let blogs = config.recipe("Blogs").unwrap().meta("someone", "someone/feeds").unwrap();
        assert_eq!(blogs.description, "Friends");

        assert!(config.recipe("Blogs").unwrap().meta("someone", "feeds").is_err());
    }

    fn recipe(name: &str) -> Recipe {
        Recipe {
            name: name.to_string(),
            description: None,
            urls: Some(vec!["https://a.example/feed".to_string()]),
            filters: Vec::new(),
            limit: None,
        }
    }

    #[test]
    fn feed_url_points_at_the_written_file() {
        assert_eq!(recipe("Crypto News").file_stem(), "Crypto News");
        assert_eq!(recipe("../etc/passwd").file_stem(), ".._etc_passwd");

        let meta = recipe("Quiet/Blogs").meta("someone", "someone/feeds").unwrap();
        assert_eq!(
            meta.feed_url,
            "https://raw.githubusercontent.com/someone/feeds/deploy/well-done/Quiet_Blogs.json"
        );
    }
}
