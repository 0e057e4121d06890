use crate::types::{FeedItem, FeedMeta, FeedRenderer};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::io::Write;

const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";
const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Serialize)]
struct JsonFeedAuthorOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct JsonFeedItemOut<'a> {
    id: &'a str,
    url: &'a str,
    title: &'a str,
    content_html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    date_published: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_modified: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<JsonFeedAuthorOut<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonFeedOut<'a> {
    version: &'static str,
    title: &'a str,
    home_page_url: &'a str,
    feed_url: &'a str,
    description: &'a str,
    authors: Vec<JsonFeedAuthorOut<'a>>,
    items: Vec<JsonFeedItemOut<'a>>,
}

/// JSON Feed 1.1 document.
pub struct JsonFeedRenderer;

impl FeedRenderer for JsonFeedRenderer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, meta: &FeedMeta, items: &[FeedItem]) -> anyhow::Result<String> {
        let document = JsonFeedOut {
            version: JSON_FEED_VERSION,
            title: &meta.title,
            home_page_url: &meta.home_page_url,
            feed_url: &meta.feed_url,
            description: &meta.description,
            authors: vec![JsonFeedAuthorOut {
                name: Some(&meta.author_name),
                url: Some(&meta.author_link),
            }],
            items: items.iter().map(json_item).collect(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

fn json_item(item: &FeedItem) -> JsonFeedItemOut<'_> {
    // Full content goes to content_html, the description then serves as summary
    let (content_html, summary) = match item.content.as_deref() {
        Some(content) if content != item.description => (content, Some(item.description.as_str())),
        Some(content) => (content, None),
        None => (item.description.as_str(), None),
    };

    let authors = if item.author_name.is_some() || item.author_link.is_some() {
        vec![JsonFeedAuthorOut {
            name: item.author_name.as_deref(),
            url: item.author_link.as_deref(),
        }]
    } else {
        Vec::new()
    };

    JsonFeedItemOut {
        id: &item.unique_id,
        url: &item.link,
        title: &item.title,
        content_html,
        summary: summary.filter(|s| !s.is_empty()),
        date_published: rfc3339(&item.pubdate),
        date_modified: item.update.as_ref().map(rfc3339),
        authors,
    }
}

/// Atom 1.0 document.
pub struct AtomRenderer;

impl FeedRenderer for AtomRenderer {
    fn extension(&self) -> &'static str {
        "xml"
    }

    fn render(&self, meta: &FeedMeta, items: &[FeedItem]) -> anyhow::Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let feed = BytesStart::new("feed").with_attributes([("xmlns", ATOM_NAMESPACE)]);
        writer.write_event(Event::Start(feed))?;

        write_text_element(&mut writer, "title", &meta.title, None)?;
        write_link(&mut writer, &meta.home_page_url, "alternate")?;
        write_link(&mut writer, &meta.feed_url, "self")?;
        write_text_element(&mut writer, "id", &meta.feed_url, None)?;
        write_text_element(&mut writer, "subtitle", &meta.description, None)?;

        // Newest timestamp of the merged items; the epoch keeps an empty feed stable
        let updated = items
            .iter()
            .map(|item| item.update.unwrap_or(item.pubdate).max(item.pubdate))
            .max()
            .unwrap_or(DateTime::UNIX_EPOCH);
        write_text_element(&mut writer, "updated", &rfc3339(&updated), None)?;

        write_person(&mut writer, Some(&meta.author_name), Some(&meta.author_link), None)?;

        for item in items {
            write_entry(&mut writer, item)?;
        }

        writer.write_event(Event::End(BytesEnd::new("feed")))?;

        let mut out = String::from_utf8(writer.into_inner())?;
        out.push('\n');
        Ok(out)
    }
}

fn write_entry<W: Write>(writer: &mut Writer<W>, item: &FeedItem) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("entry")))?;

    write_text_element(writer, "title", &item.title, None)?;
    write_link(writer, &item.link, "alternate")?;
    write_text_element(writer, "id", &item.unique_id, None)?;
    write_text_element(writer, "published", &rfc3339(&item.pubdate), None)?;
    write_text_element(writer, "updated", &rfc3339(&item.update.unwrap_or(item.pubdate)), None)?;

    if item.author_name.is_some() || item.author_link.is_some() || item.author_email.is_some() {
        write_person(
            writer,
            item.author_name.as_deref(),
            item.author_link.as_deref(),
            item.author_email.as_deref(),
        )?;
    }

    if !item.description.is_empty() {
        write_text_element(writer, "summary", &item.description, Some("html"))?;
    }
    if let Some(content) = &item.content {
        write_text_element(writer, "content", content, Some("html"))?;
    }

    writer.write_event(Event::End(BytesEnd::new("entry")))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
    content_type: Option<&str>,
) -> anyhow::Result<()> {
    let mut start = BytesStart::new(name);
    if let Some(content_type) = content_type {
        start.push_attribute(("type", content_type));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(&sanitize_text(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_link<W: Write>(writer: &mut Writer<W>, href: &str, rel: &str) -> anyhow::Result<()> {
    let link = BytesStart::new("link").with_attributes([("href", href), ("rel", rel)]);
    writer.write_event(Event::Empty(link))?;
    Ok(())
}

fn write_person<W: Write>(
    writer: &mut Writer<W>,
    name: Option<&str>,
    uri: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("author")))?;
    // Atom requires a name on every person construct
    write_text_element(writer, "name", name.unwrap_or_default(), None)?;
    if let Some(uri) = uri {
        write_text_element(writer, "uri", uri, None)?;
    }
    if let Some(email) = email {
        write_text_element(writer, "email", email, None)?;
    }
    writer.write_event(Event::End(BytesEnd::new("author")))?;
    Ok(())
}

/// Strips control characters that are not allowed in XML 1.0.
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta() -> FeedMeta {
        FeedMeta {
            title: "Crypto".to_string(),
            description: "Auto generated by feedcooker with love.".to_string(),
            home_page_url: "https://github.com/someone/feeds".to_string(),
            feed_url: "https://raw.githubusercontent.com/someone/feeds/deploy/well-done/Crypto.json".to_string(),
            author_name: "someone".to_string(),
            author_link: "https://github.com/someone".to_string(),
        }
    }

    fn items() -> Vec<FeedItem> {
        let mut rich = FeedItem::new(
            "Rich & <bold>",
            "https://a.example/1",
            "a-1",
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
        );
        rich.description = "<p>full</p>".to_string();
        rich.content = Some("<p>full</p>".to_string());
        rich.author_name = Some("Ann from A".to_string());
        rich.author_email = Some("ann@a.example".to_string());
        rich.update = Some(Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap());

        let mut plain = FeedItem::new(
            "Plain",
            "https://b.example/1",
            "b-1",
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        );
        plain.description = "short\u{1}".to_string();
        vec![rich, plain]
    }

    #[test]
    fn json_feed_keeps_order_and_fields() {
        let rendered = JsonFeedRenderer.render(&meta(), &items()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["version"], JSON_FEED_VERSION);
        assert_eq!(value["feed_url"], meta().feed_url);
        let rendered_items = value["items"].as_array().unwrap();
        assert_eq!(rendered_items.len(), 2);
        assert_eq!(rendered_items[0]["id"], "a-1");
        assert_eq!(rendered_items[0]["content_html"], "<p>full</p>");
        assert!(rendered_items[0].get("summary").is_none());
        assert_eq!(rendered_items[0]["date_published"], "2024-01-03T00:00:00Z");
        assert_eq!(rendered_items[0]["date_modified"], "2024-01-04T00:00:00Z");
        assert_eq!(rendered_items[0]["authors"][0]["name"], "Ann from A");
        assert_eq!(rendered_items[1]["id"], "b-1");
        assert!(rendered_items[1].get("authors").is_none());
    }

    #[test]
    fn atom_feed_escapes_and_sanitizes() {
        let rendered = AtomRenderer.render(&meta(), &items()).unwrap();

        assert!(rendered.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(rendered.contains("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(rendered.contains("Rich &amp; &lt;bold&gt;"));
        assert!(rendered.contains("<updated>2024-01-04T00:00:00Z</updated>"));
        assert!(rendered.contains("<email>ann@a.example</email>"));
        assert!(!rendered.contains('\u{1}'));
        assert!(rendered.find("a-1").unwrap() < rendered.find("b-1").unwrap());
    }

    #[test]
    fn empty_feeds_are_still_valid_documents() {
        let json = JsonFeedRenderer.render(&meta(), &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 0);

        let atom = AtomRenderer.render(&meta(), &[]).unwrap();
        assert!(atom.contains("<updated>1970-01-01T00:00:00Z</updated>"));
        assert!(!atom.contains("<entry>"));
        assert!(atom.trim_end().ends_with("</feed>"));
    }
}
