/// Helpers shared by the normalizers, filters and renderers

/// URL helpers
pub mod url {
    use url::Url;

    /// Host (with port, if any) of a link, used when a feed has no title.
    pub fn host_of(link: &str) -> Option<String> {
        match Url::parse(link) {
            Ok(url) => {
                let host = url.host_str()?;
                Some(match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                })
            }
            // Not absolute; take whatever sits between "//" and the next "/"
            Err(_) => link
                .split('/')
                .nth(2)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        }
    }

    /// True when the URL path ends in `.json`, ignoring query and fragment.
    pub fn has_json_path(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => url.path().ends_with(".json"),
            Err(_) => url_str.ends_with(".json"),
        }
    }

    pub fn is_http_url(url_str: &str) -> bool {
        Url::parse(url_str)
            .map(|url| url.scheme() == "http" || url.scheme() == "https")
            .unwrap_or(false)
    }
}

/// Timestamp helpers
pub mod time {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    /// Lenient parsing of feed timestamps. Values without an offset are taken as UTC.
    pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Drops sub-second precision, keeping year through second.
    pub fn to_second_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
        dt.trunc_subsecs(0)
    }
}

/// Text helpers for feed content
pub mod feed {
    /// First candidate that is present and not blank, in the given order.
    pub fn first_non_empty<'a, I>(candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        candidates
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }

    /// Extract clean text content from HTML
    pub fn extract_text_from_html(html: &str) -> String {
        html.chars()
            .fold((String::new(), false), |(mut text, in_tag), c| match c {
                '<' => (text, true),
                '>' if in_tag => {
                    // Keep words on either side of a tag apart
                    text.push(' ');
                    (text, false)
                }
                _ if !in_tag => {
                    text.push(c);
                    (text, in_tag)
                }
                _ => (text, in_tag),
            })
            .0
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Cuts `text` to at most `max_chars` characters.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => text[..idx].to_string(),
            None => text.to_string(),
        }
    }
}
