use crate::rss_utils::feed::first_non_empty;
use crate::rss_utils::time::{parse_feed_date, to_second_precision};
use crate::rss_utils::url::{has_json_path, host_of};
use crate::types::{CachedResponse, CookerError, FeedItem, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, Person};
use feed_rs::parser;
use serde::Deserialize;
use tracing::debug;

const JSON_MEDIA_TYPES: &[&str] = &["application/json", "application/feed+json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    JsonFeed,
    /// RSS or Atom, both handled by feed-rs
    Syndication,
}

/// JSON media type or a `.json` path means JSON Feed; everything else is
/// parsed as RSS/Atom.
pub fn detect_format(url: &str, content_type: Option<&str>) -> FeedFormat {
    let json_content_type = content_type
        .map(|ct| ct.trim().to_ascii_lowercase())
        .is_some_and(|ct| JSON_MEDIA_TYPES.iter().any(|media| ct.starts_with(*media)));

    if json_content_type || has_json_path(url) {
        FeedFormat::JsonFeed
    } else {
        FeedFormat::Syndication
    }
}

/// Maps feed entries onto `FeedItem`s.
///
/// `fallback_time` is the pubdate given to undated entries; it is captured
/// once per fetched response so every undated entry of a source shares it.
pub struct FeedParser {
    fallback_time: DateTime<Utc>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(fallback_time: DateTime<Utc>) -> Self {
        Self { fallback_time }
    }

    pub fn normalize(&self, response: &CachedResponse) -> Result<Vec<FeedItem>> {
        let format = detect_format(&response.url, response.content_type.as_deref());
        debug!(
            "Parsing {} as {:?} (content type: {:?}, encoding: {})",
            response.url, format, response.content_type, response.encoding
        );

        match format {
            FeedFormat::JsonFeed => self.parse_json_feed(&response.body),
            FeedFormat::Syndication => self.parse_syndication(&response.body),
        }
    }

    pub fn parse_json_feed(&self, body: &str) -> Result<Vec<FeedItem>> {
        let document: JsonFeedDocument = serde_json::from_str(body)
            .map_err(|e| CookerError::Parse(format!("Failed to parse JSON feed: {}", e)))?;

        let items: Vec<FeedItem> = document
            .items
            .iter()
            .filter_map(|entry| self.json_entry_to_item(&document, entry))
            .collect();

        debug!("Parsed JSON feed with {} items", items.len());
        Ok(items)
    }

    pub fn parse_syndication(&self, body: &str) -> Result<Vec<FeedItem>> {
        let feed = parser::parse(body.as_bytes())
            .map_err(|e| CookerError::Parse(format!("Failed to parse feed: {}", e)))?;

        let items: Vec<FeedItem> = feed
            .entries
            .iter()
            .filter_map(|entry| self.entry_to_item(&feed, entry))
            .collect();

        debug!("Parsed feed with {} entries", items.len());
        Ok(items)
    }

    fn json_entry_to_item(&self, document: &JsonFeedDocument, entry: &JsonFeedEntry) -> Option<FeedItem> {
        let Some(link) = first_non_empty([entry.url.as_deref(), entry.external_url.as_deref()]) else {
            debug!("Skipping JSON feed item without url: {:?}", entry.id);
            return None;
        };

        let unique_id = entry.id_string().unwrap_or_else(|| link.to_string());
        let (description, content) = resolve_description(
            [
                entry.content_html.as_deref(),
                entry.content_text.as_deref(),
                entry.content.as_deref(),
            ],
            entry.summary.as_deref(),
        );

        // Entry author first, then the feed-level one
        let author = [
            entry.author.as_ref(),
            entry.authors.first(),
            document.author.as_ref(),
            document.authors.first(),
        ]
        .into_iter()
        .flatten()
        .next();

        let author_name = author
            .and_then(|a| first_non_empty([a.name.as_deref()]))
            .map(|name| name.to_string())
            .or_else(|| source_label(document.title.as_deref(), link));

        let update = entry.date_modified.as_deref().and_then(parse_json_date);
        let pubdate = entry
            .date_published
            .as_deref()
            .and_then(parse_json_date)
            .or(update)
            .unwrap_or(self.fallback_time);

        Some(FeedItem {
            title: entry.title.clone().unwrap_or_default(),
            link: link.to_string(),
            unique_id,
            description,
            content,
            author_name,
            author_link: author.and_then(|a| a.url.clone()),
            author_email: None,
            pubdate,
            update,
        })
    }

    fn entry_to_item(&self, feed: &Feed, entry: &Entry) -> Option<FeedItem> {
        let Some(link) = select_entry_link(entry) else {
            debug!("Skipping entry without link: {}", entry.id);
            return None;
        };

        let unique_id = if entry.id.trim().is_empty() {
            link.clone()
        } else {
            entry.id.clone()
        };

        let content = entry.content.as_ref().and_then(|c| c.body.as_deref());
        let summary = entry.summary.as_ref().map(|s| s.content.as_str());
        let (description, content) = resolve_description([content], summary);

        let feed_title = feed.title.as_ref().map(|t| t.content.as_str());
        let source = source_label(feed_title, &link);
        let author = resolve_author(entry, feed);

        let author_name = match author.as_ref().and_then(|a| a.name.clone()) {
            Some(name) => Some(match &source {
                Some(source) => format!("{} from {}", name, source),
                None => name,
            }),
            None => source,
        };

        let update = entry.updated.map(to_second_precision);
        let pubdate = entry
            .published
            .map(to_second_precision)
            .or(update)
            .unwrap_or(self.fallback_time);

        Some(FeedItem {
            title: entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_default(),
            link,
            unique_id,
            description,
            content,
            author_name,
            author_link: author.as_ref().and_then(|a| a.link.clone()),
            author_email: author.and_then(|a| a.email),
            pubdate,
            update,
        })
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Content wins over summary. When content is used it is kept as `content`
/// too; a summary-only entry gets no `content`.
fn resolve_description<'a, const N: usize>(
    content_candidates: [Option<&'a str>; N],
    summary: Option<&'a str>,
) -> (String, Option<String>) {
    if let Some(content) = first_non_empty(content_candidates) {
        return (content.to_string(), Some(content.to_string()));
    }
    match first_non_empty([summary]) {
        Some(summary) => (summary.to_string(), None),
        None => (String::new(), None),
    }
}

/// Feed title, or the link's host when the feed has no title.
fn source_label(feed_title: Option<&str>, link: &str) -> Option<String> {
    first_non_empty([feed_title])
        .map(|t| t.to_string())
        .or_else(|| host_of(link))
}

/// Alternate link first, then any non-empty link, then an absolute-URL id.
fn select_entry_link(entry: &Entry) -> Option<String> {
    let alternate = entry.links.iter().find(|link| {
        let rel = link.rel.as_deref().unwrap_or("");
        !link.href.trim().is_empty() && (rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    });
    if let Some(link) = alternate.or_else(|| entry.links.iter().find(|l| !l.href.trim().is_empty())) {
        return Some(link.href.trim().to_string());
    }

    let id = entry.id.trim();
    (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuthor {
    pub name: Option<String>,
    pub link: Option<String>,
    pub email: Option<String>,
}

/// First author of the entry, then of the feed. Names, uris and emails all
/// count; an entry's own author always beats the feed-level one.
pub fn resolve_author(entry: &Entry, feed: &Feed) -> Option<ResolvedAuthor> {
    first_author(&entry.authors).or_else(|| first_author(&feed.authors))
}

fn first_author(people: &[Person]) -> Option<ResolvedAuthor> {
    people
        .iter()
        .map(person_fields)
        .find(|p| p.name.is_some() || p.link.is_some() || p.email.is_some())
}

/// feed-rs keeps RSS `<author>` text as the email of a person named after the
/// element, so `jane@example.com (Jane Doe)` and bare names are split here.
fn person_fields(person: &Person) -> ResolvedAuthor {
    let placeholder = RSS_CONTACT_ROLES.contains(&person.name.as_str());
    let raw_email = person.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    let (name, email) = match raw_email {
        Some(raw) if placeholder => match raw.split_once('(') {
            Some((email, rest)) => (
                first_non_empty([Some(rest.trim_end_matches(')').trim())]).map(str::to_string),
                first_non_empty([Some(email.trim())]).map(str::to_string),
            ),
            None if raw.contains('@') => (None, Some(raw.to_string())),
            None => (Some(raw.to_string()), None),
        },
        _ => (
            first_non_empty([Some(person.name.as_str())]).map(str::to_string),
            raw_email.map(str::to_string),
        ),
    };

    ResolvedAuthor {
        name,
        link: person.uri.as_deref().map(str::trim).filter(|u| !u.is_empty()).map(str::to_string),
        email,
    }
}

const RSS_CONTACT_ROLES: &[&str] = &["author", "managingEditor", "webMaster"];

fn parse_json_date(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_feed_date(raw);
    if parsed.is_none() {
        debug!("Ignoring unparseable JSON feed date: {}", raw);
    }
    parsed
}

#[derive(Debug, Deserialize)]
struct JsonFeedDocument {
    title: Option<String>,
    author: Option<JsonFeedAuthor>,
    #[serde(default)]
    authors: Vec<JsonFeedAuthor>,
    items: Vec<JsonFeedEntry>,
}

#[derive(Debug, Deserialize)]
struct JsonFeedEntry {
    id: Option<serde_json::Value>,
    url: Option<String>,
    external_url: Option<String>,
    title: Option<String>,
    content_html: Option<String>,
    content_text: Option<String>,
    content: Option<String>,
    summary: Option<String>,
    date_published: Option<String>,
    date_modified: Option<String>,
    author: Option<JsonFeedAuthor>,
    #[serde(default)]
    authors: Vec<JsonFeedAuthor>,
}

impl JsonFeedEntry {
    /// JSON Feed ids are strings, but numeric ids show up in the wild.
    fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonFeedAuthor {
    name: Option<String>,
    url: Option<String>,
}
