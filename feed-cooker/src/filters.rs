use crate::rss_utils::feed::{extract_text_from_html, truncate_chars};
use crate::types::{CookerError, FeedItem, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Declarative filter descriptor as written in the recipe:
/// `{ kind = "exclude_keywords", keywords = ["sponsored"] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: String,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl FilterSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    fn parse_params<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(serde_json::Value::Object(self.params.clone()))
            .map_err(|e| CookerError::Config(format!("Invalid parameters for filter '{}': {}", self.kind, e)))
    }
}

/// One stage of the per-source filter chain.
pub trait FeedFilter {
    fn name(&self) -> &'static str;

    /// May drop or rewrite items, never invents new ones.
    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Title,
    Description,
    Content,
    Author,
    Link,
}

impl MatchField {
    fn value<'a>(&self, item: &'a FeedItem) -> Option<&'a str> {
        match self {
            MatchField::Title => Some(&item.title),
            MatchField::Description => Some(&item.description),
            MatchField::Content => item.content.as_deref(),
            MatchField::Author => item.author_name.as_deref(),
            MatchField::Link => Some(&item.link),
        }
    }
}

fn default_fields() -> Vec<MatchField> {
    vec![MatchField::Title, MatchField::Description]
}

#[derive(Debug, Clone)]
pub struct NonEmptyTitle;

impl FeedFilter for NonEmptyTitle {
    fn name(&self) -> &'static str {
        "non_empty_title"
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        items
            .into_iter()
            .filter(|item| !item.title.trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeywordParams {
    keywords: Vec<String>,
    #[serde(default = "default_fields")]
    fields: Vec<MatchField>,
}

/// Case-insensitive keyword match over selected fields.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
    fields: Vec<MatchField>,
    exclude: bool,
}

impl KeywordFilter {
    pub fn include(keywords: Vec<String>, fields: Vec<MatchField>) -> Self {
        Self::build(keywords, fields, false)
    }

    pub fn exclude(keywords: Vec<String>, fields: Vec<MatchField>) -> Self {
        Self::build(keywords, fields, true)
    }

    fn build(keywords: Vec<String>, fields: Vec<MatchField>, exclude: bool) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            fields,
            exclude,
        }
    }

    fn matches(&self, item: &FeedItem) -> bool {
        self.fields
            .iter()
            .filter_map(|field| field.value(item))
            .map(|text| text.to_lowercase())
            .any(|text| self.keywords.iter().any(|k| text.contains(k.as_str())))
    }
}

impl FeedFilter for KeywordFilter {
    fn name(&self) -> &'static str {
        if self.exclude {
            "exclude_keywords"
        } else {
            "include_keywords"
        }
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        items
            .into_iter()
            .filter(|item| self.matches(item) != self.exclude)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TitlePatternParams {
    pattern: String,
    #[serde(default)]
    invert: bool,
}

/// Keeps items whose title matches, or does not match when inverted.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    pattern: Regex,
    invert: bool,
}

impl TitlePattern {
    pub fn new(pattern: &str, invert: bool) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| CookerError::Config(format!("Invalid title pattern '{}': {}", pattern, e)))?;
        Ok(Self { pattern, invert })
    }
}

impl FeedFilter for TitlePattern {
    fn name(&self) -> &'static str {
        "title_pattern"
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        items
            .into_iter()
            .filter(|item| self.pattern.is_match(&item.title) != self.invert)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct MaxAgeParams {
    days: u32,
}

#[derive(Debug, Clone)]
pub struct MaxAge {
    cutoff: DateTime<Utc>,
}

impl MaxAge {
    /// Ages reaching past the representable range keep everything.
    pub fn new(days: u32, now: DateTime<Utc>) -> Self {
        let cutoff = Duration::try_days(i64::from(days))
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { cutoff }
    }
}

impl FeedFilter for MaxAge {
    fn name(&self) -> &'static str {
        "max_age"
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        items
            .into_iter()
            .filter(|item| item.pubdate >= self.cutoff)
            .collect()
    }
}

/// Drops later items repeating the link of an earlier one.
#[derive(Debug, Clone)]
pub struct DedupeLinks;

impl FeedFilter for DedupeLinks {
    fn name(&self) -> &'static str {
        "dedupe_links"
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        let mut seen = HashSet::new();
        items
            .into_iter()
            .filter(|item| seen.insert(item.link.clone()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct StripHtml;

impl FeedFilter for StripHtml {
    fn name(&self) -> &'static str {
        "strip_html"
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        items
            .into_iter()
            .map(|mut item| {
                item.description = extract_text_from_html(&item.description);
                item
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TruncateParams {
    max_chars: usize,
}

#[derive(Debug, Clone)]
pub struct TruncateDescription {
    max_chars: usize,
}

impl TruncateDescription {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl FeedFilter for TruncateDescription {
    fn name(&self) -> &'static str {
        "truncate_description"
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        items
            .into_iter()
            .map(|mut item| {
                item.description = truncate_chars(&item.description, self.max_chars);
                item
            })
            .collect()
    }
}

/// Every filter kind known to the registry.
#[derive(Debug, Clone)]
pub enum Filter {
    NonEmptyTitle(NonEmptyTitle),
    Keywords(KeywordFilter),
    TitlePattern(TitlePattern),
    MaxAge(MaxAge),
    DedupeLinks(DedupeLinks),
    StripHtml(StripHtml),
    TruncateDescription(TruncateDescription),
}

impl FeedFilter for Filter {
    fn name(&self) -> &'static str {
        match self {
            Filter::NonEmptyTitle(f) => f.name(),
            Filter::Keywords(f) => f.name(),
            Filter::TitlePattern(f) => f.name(),
            Filter::MaxAge(f) => f.name(),
            Filter::DedupeLinks(f) => f.name(),
            Filter::StripHtml(f) => f.name(),
            Filter::TruncateDescription(f) => f.name(),
        }
    }

    fn filter(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        match self {
            Filter::NonEmptyTitle(f) => f.filter(items),
            Filter::Keywords(f) => f.filter(items),
            Filter::TitlePattern(f) => f.filter(items),
            Filter::MaxAge(f) => f.filter(items),
            Filter::DedupeLinks(f) => f.filter(items),
            Filter::StripHtml(f) => f.filter(items),
            Filter::TruncateDescription(f) => f.filter(items),
        }
    }
}

type FilterConstructor = fn(&FilterSpec, DateTime<Utc>) -> Result<Filter>;

/// Filter kind -> constructor.
const REGISTRY: &[(&str, FilterConstructor)] = &[
    ("non_empty_title", build_non_empty_title),
    ("include_keywords", build_include_keywords),
    ("exclude_keywords", build_exclude_keywords),
    ("title_pattern", build_title_pattern),
    ("max_age", build_max_age),
    ("dedupe_links", build_dedupe_links),
    ("strip_html", build_strip_html),
    ("truncate_description", build_truncate_description),
];

pub fn known_kinds() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(kind, _)| *kind)
}

fn expect_no_params(spec: &FilterSpec) -> Result<()> {
    if spec.params.is_empty() {
        Ok(())
    } else {
        let keys: Vec<&str> = spec.params.keys().map(|k| k.as_str()).collect();
        Err(CookerError::Config(format!(
            "Filter '{}' takes no parameters, got: {}",
            spec.kind,
            keys.join(", ")
        )))
    }
}

fn build_non_empty_title(spec: &FilterSpec, _now: DateTime<Utc>) -> Result<Filter> {
    expect_no_params(spec)?;
    Ok(Filter::NonEmptyTitle(NonEmptyTitle))
}

fn build_include_keywords(spec: &FilterSpec, _now: DateTime<Utc>) -> Result<Filter> {
    let params: KeywordParams = spec.parse_params()?;
    Ok(Filter::Keywords(KeywordFilter::include(params.keywords, params.fields)))
}

fn build_exclude_keywords(spec: &FilterSpec, _now: DateTime<Utc>) -> Result<Filter> {
    let params: KeywordParams = spec.parse_params()?;
    Ok(Filter::Keywords(KeywordFilter::exclude(params.keywords, params.fields)))
}

fn build_title_pattern(spec: &FilterSpec, _now: DateTime<Utc>) -> Result<Filter> {
    let params: TitlePatternParams = spec.parse_params()?;
    Ok(Filter::TitlePattern(TitlePattern::new(&params.pattern, params.invert)?))
}

fn build_max_age(spec: &FilterSpec, now: DateTime<Utc>) -> Result<Filter> {
    let params: MaxAgeParams = spec.parse_params()?;
    Ok(Filter::MaxAge(MaxAge::new(params.days, now)))
}

fn build_dedupe_links(spec: &FilterSpec, _now: DateTime<Utc>) -> Result<Filter> {
    expect_no_params(spec)?;
    Ok(Filter::DedupeLinks(DedupeLinks))
}

fn build_strip_html(spec: &FilterSpec, _now: DateTime<Utc>) -> Result<Filter> {
    expect_no_params(spec)?;
    Ok(Filter::StripHtml(StripHtml))
}

fn build_truncate_description(spec: &FilterSpec, _now: DateTime<Utc>) -> Result<Filter> {
    let params: TruncateParams = spec.parse_params()?;
    Ok(Filter::TruncateDescription(TruncateDescription::new(params.max_chars)))
}

impl Filter {
    pub fn from_spec(spec: &FilterSpec, now: DateTime<Utc>) -> Result<Self> {
        let constructor = REGISTRY
            .iter()
            .find(|(kind, _)| *kind == spec.kind)
            .map(|(_, constructor)| *constructor)
            .ok_or_else(|| {
                CookerError::Config(format!(
                    "Unknown filter kind '{}' (known: {})",
                    spec.kind,
                    known_kinds().collect::<Vec<_>>().join(", ")
                ))
            })?;
        constructor(spec, now)
    }
}

/// Removal count of one filter stage for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub filter: &'static str,
    pub before: usize,
    pub after: usize,
}

impl StageReport {
    pub fn removed(&self) -> usize {
        self.before.saturating_sub(self.after)
    }
}

#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub items: Vec<FeedItem>,
    pub stages: Vec<StageReport>,
}

/// Filters applied in configured order, then the per-source limit once.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn from_specs(specs: &[FilterSpec]) -> Result<Self> {
        Self::from_specs_at(specs, Utc::now())
    }

    /// `now` anchors time-relative filters such as `max_age`.
    pub fn from_specs_at(specs: &[FilterSpec], now: DateTime<Utc>) -> Result<Self> {
        let filters = specs
            .iter()
            .map(|spec| Filter::from_spec(spec, now))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { filters })
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, url: &str, items: Vec<FeedItem>, limit: usize) -> ChainOutcome {
        if items.is_empty() {
            return ChainOutcome {
                items,
                stages: Vec::new(),
            };
        }

        let mut items = items;
        let mut stages = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let before = items.len();
            items = filter.filter(items);
            let report = StageReport {
                filter: filter.name(),
                before,
                after: items.len(),
            };
            if report.removed() > 0 {
                debug!("-{} by {} {}", report.removed(), report.filter, url);
            }
            stages.push(report);
        }

        items.truncate(limit);
        ChainOutcome { items, stages }
    }
}
