//! Record extraction from rendered timeline units.
//!
//! A [`RenderedUnit`] is the markup of one `timeline-item` as served by the
//! front-end. [`RecordExtractor::extract`] turns it into a [`PostRecord`] or
//! reports it [`Unparseable`]. Only a missing post id makes a unit
//! unparseable; every other field falls back to its default:
//!
//! | Field | Source | Default |
//! |-------|--------|---------|
//! | `post_id` | `.tweet-link` / `.tweet-date a` status link | required |
//! | `text` | `.tweet-content` | empty |
//! | `created_at` | `.tweet-date a[title]` | `None` |
//! | counts | `.tweet-stats` icons | 0 |
//! | `is_retweet` | `.retweet-header` | false |
//! | `is_quote` | `.quote` | false |
//! | `is_reply` / `reply_to_id` | `.replying-to` link | false / `None` |
//! | entities | patterns over `text`, content links | empty |
//! | `media` | `.attachment.image img`, `.attachment.video` | empty |
//!
//! The quoted post embedded in a quote is cut out before any field is read,
//! so its text, date and stats never leak into the outer record.

pub mod cache;
pub mod entities;
pub mod lang;
pub mod markup;

use crate::{MediaItem, MediaKind, PostRecord};
use cache::SessionCache;
use lang::{LanguageDetector, ScriptDetector};
use markup::Element;
use std::borrow::Cow;
use thiserror::Error;
use tracing::debug;

/// Markup of one rendered content unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedUnit {
    /// Raw fragment
    pub markup: String,
}

impl RenderedUnit {
    /// Wrap a fragment
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }
}

/// Why a unit produced no record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unparseable {
    /// Blank markup
    #[error("rendered unit is empty")]
    Empty,

    /// No status link to take the post id from
    #[error("no post id found in rendered unit")]
    MissingPostId,

    /// A record was built but broke a record invariant
    #[error("extracted record is invalid: {0}")]
    Invalid(String),
}

/// Stateful extractor for one session
pub struct RecordExtractor {
    fallback_author: String,
    cache: SessionCache,
    detector: Box<dyn LanguageDetector + Send>,
}

impl RecordExtractor {
    /// Extractor attributing units without an author link to `fallback_author`
    pub fn new(fallback_author: impl Into<String>) -> Self {
        Self {
            fallback_author: fallback_author.into(),
            cache: SessionCache::new(),
            detector: Box::new(ScriptDetector),
        }
    }

    /// Replace the language detector
    pub fn with_detector(mut self, detector: Box<dyn LanguageDetector + Send>) -> Self {
        self.detector = detector;
        self
    }

    /// `(hits, misses)` of the session cache
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }

    /// Parse one unit
    pub fn extract(&mut self, unit: &RenderedUnit) -> Result<PostRecord, Unparseable> {
        let markup = unit.markup.trim();
        if markup.is_empty() {
            return Err(Unparseable::Empty);
        }

        let quote = markup::first_by_class(markup, "quote");
        let is_quote = quote.is_some();
        let main: Cow<'_, str> = match &quote {
            Some(q) => {
                let (start, end) = q.span();
                Cow::Owned(format!("{}{}", &markup[..start], &markup[end..]))
            }
            None => Cow::Borrowed(markup),
        };
        let main = main.as_ref();

        let post_id = find_post_id(main).ok_or(Unparseable::MissingPostId)?;

        let created_at = date_link(main)
            .and_then(|a| a.attr("title"))
            .and_then(|title| entities::parse_created_at(&title));

        let content = markup::first_by_class(main, "tweet-content");
        let text = content.as_ref().map(Element::text).unwrap_or_default();

        let handle = find_author_handle(main).unwrap_or_else(|| self.fallback_author.clone());
        let author_id_hashed = self.cache.author_hash(&handle);

        let reply_to_id = markup::first_by_class(main, "replying-to")
            .and_then(|marker| self.reply_target(&marker));
        if reply_to_id.is_none() && markup::first_by_class(main, "replying-to").is_some() {
            debug!(post_id = %post_id, "Reply marker without a resolvable target");
        }

        let mut urls: Vec<String> = content
            .as_ref()
            .map(|c| {
                markup::find_by_tag(c.inner(), "a")
                    .iter()
                    .filter_map(|a| a.attr("href"))
                    .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
                    .collect()
            })
            .unwrap_or_default();
        urls.extend(entities::extract_urls(&text));

        let (comment_count, retweet_count, like_count) = engagement(main);
        let lang = self.cache.language(&text, &*self.detector);

        let record = PostRecord {
            post_id,
            created_at,
            lang,
            author_id_hashed,
            retweet_count,
            like_count,
            comment_count,
            is_reply: reply_to_id.is_some(),
            reply_to_id,
            is_retweet: markup::first_by_class(main, "retweet-header").is_some(),
            is_quote,
            urls: entities::dedup_preserving(urls),
            hashtags: entities::dedup_preserving(entities::extract_hashtags(&text)),
            mentions: entities::dedup_preserving(entities::extract_mentions(&text)),
            media: media(main),
            text,
        };

        record.validate().map_err(Unparseable::Invalid)?;
        Ok(record)
    }

    /// Replied-to post id, or the hashed replied-to handle when only the account is linked
    fn reply_target(&mut self, marker: &Element<'_>) -> Option<String> {
        let links = markup::find_by_tag(marker.inner(), "a");
        let hrefs: Vec<String> = links.iter().filter_map(|a| a.attr("href")).collect();

        if let Some(id) = hrefs.iter().find_map(|href| entities::status_id(href)) {
            return Some(id);
        }

        hrefs
            .iter()
            .find_map(|href| entities::handle_from_href(href))
            .or_else(|| {
                entities::extract_mentions(&marker.text())
                    .into_iter()
                    .next()
            })
            .map(|handle| self.cache.author_hash(&handle))
    }
}

fn date_link(main: &str) -> Option<Element<'_>> {
    let date = markup::first_by_class(main, "tweet-date")?;
    if date.tag() == "a" {
        return Some(date);
    }
    date.descendants().into_iter().find(|el| el.tag() == "a")
}

fn find_post_id(main: &str) -> Option<String> {
    markup::first_by_class(main, "tweet-link")
        .and_then(|link| link.attr("href"))
        .and_then(|href| entities::status_id(&href))
        .or_else(|| {
            date_link(main)
                .and_then(|a| a.attr("href"))
                .and_then(|href| entities::status_id(&href))
        })
}

fn find_author_handle(main: &str) -> Option<String> {
    if let Some(username) = markup::first_by_class(main, "username") {
        let from_href = username
            .attr("href")
            .and_then(|href| entities::handle_from_href(&href));
        if from_href.is_some() {
            return from_href;
        }
        let from_text = username.text();
        let from_text = from_text.trim().trim_start_matches('@');
        if !from_text.is_empty() {
            return Some(from_text.to_string());
        }
    }

    markup::first_by_class(main, "tweet-link")
        .and_then(|link| link.attr("href"))
        .and_then(|href| entities::handle_from_href(&href))
}

/// `(comments, retweets, likes)` read from the stats block only.
fn engagement(main: &str) -> (u64, u64, u64) {
    let Some(stats) = markup::first_by_class(main, "tweet-stats") else {
        return (0, 0, 0);
    };

    let mut counts = (0, 0, 0);
    for stat in markup::find_by_class(stats.inner(), "tweet-stat") {
        let value = entities::parse_count(&stat.text());
        let icons = stat.descendants();
        if icons.iter().any(|el| el.has_class("icon-comment")) {
            counts.0 = value;
        } else if icons.iter().any(|el| el.has_class("icon-retweet")) {
            counts.1 = value;
        } else if icons.iter().any(|el| el.has_class("icon-heart")) {
            counts.2 = value;
        }
    }
    counts
}

fn media(main: &str) -> Vec<MediaItem> {
    let mut items = Vec::new();
    for attachment in markup::find_by_class(main, "attachment") {
        if attachment.has_class("image") {
            for img in markup::find_by_tag(attachment.inner(), "img") {
                items.push(MediaItem {
                    kind: MediaKind::Image,
                    url: img.attr("src").unwrap_or_default(),
                    alt: img.attr("alt").unwrap_or_default(),
                });
            }
        } else if attachment.has_class("video") || attachment.has_class("gif") {
            items.push(MediaItem {
                kind: MediaKind::Video,
                url: String::new(),
                alt: String::new(),
            });
        }
    }
    items
}
