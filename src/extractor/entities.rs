//! Field-level parsers used by the extractor.
//!
//! Every function here is total: a value that cannot be parsed maps to the
//! field's default instead of an error.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'\u{2026}]+"#).expect("url pattern is valid"));

static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w&/])(#\w+)").expect("hashtag pattern is valid"));

static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w/])(@\w{1,15})\b").expect("mention pattern is valid"));

static STATUS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/status/(\d+)").expect("status id pattern is valid"));

static COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([kmb])?").expect("count pattern is valid")
});

/// Front-end routes that look like handles
const RESERVED_PATHS: &[&str] = &["search", "hashtag", "i", "pic", "settings", "about"];

/// Date layouts seen in title attributes after the separator dot and zone suffix are removed
const DATE_LAYOUTS: &[&str] = &["%b %d, %Y %I:%M %p", "%b %e, %Y %I:%M %p", "%d %b %Y %H:%M"];

/// Remove duplicates keeping the first occurrence of each value
pub fn dedup_preserving(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Absolute links in `text`, with trailing sentence punctuation trimmed
pub fn extract_urls(text: &str) -> Vec<String> {
    URL.find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}'])
                .to_string()
        })
        .filter(|url| url.len() > "https://".len())
        .collect()
}

/// `text` with every link replaced by a space
pub fn strip_urls(text: &str) -> Cow<'_, str> {
    URL.replace_all(text, " ")
}

/// Hashtags including the leading `#`
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|tag| tag.chars().skip(1).any(|c| !c.is_ascii_digit()))
        .collect()
}

/// Mentions including the leading `@`
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Post id from a `/user/status/<id>` link
pub fn status_id(href: &str) -> Option<String> {
    STATUS_ID
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Account handle from a `/<handle>` or `/<handle>/status/<id>` link
pub fn handle_from_href(href: &str) -> Option<String> {
    let path = href
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, p)| p).unwrap_or(""))
        .unwrap_or(href);
    let handle = path
        .trim_start_matches('/')
        .split(['/', '?', '#'])
        .next()?
        .trim();

    if handle.is_empty()
        || RESERVED_PATHS.contains(&handle)
        || !handle.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(handle.to_string())
}

/// Engagement count such as `1,234`, `12K` or `1.5M`. Unparseable values are 0.
pub fn parse_count(raw: &str) -> u64 {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '_').collect();
    let Some(caps) = COUNT.captures(cleaned.trim()) else {
        return 0;
    };

    let Ok(number) = caps[1].parse::<f64>() else {
        return 0;
    };
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) if suffix == "k" => 1_000.0,
        Some(suffix) if suffix == "m" => 1_000_000.0,
        Some(suffix) if suffix == "b" => 1_000_000_000.0,
        _ => 1.0,
    };

    let value = (number * multiplier).round();
    if value.is_finite() && value >= 0.0 {
        value as u64
    } else {
        0
    }
}

/// Creation time from a title like `Jan 5, 2024 · 3:04 PM UTC`
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.replace('·', " ").replace(" UTC", "");
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }

    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&normalized, layout).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
