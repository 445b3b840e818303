//! Minimal markup navigation for rendered timeline units.
//!
//! Units are small, server-rendered fragments, so a tolerant scanner is
//! enough: start tags are found with a regex, closing tags are matched by
//! depth counting on the same tag name, and an unclosed element extends to
//! the end of the fragment. Tag and attribute names match case-insensitively.

use once_cell::sync::Lazy;
use regex::Regex;

static START_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([a-zA-Z][a-zA-Z0-9-]*)((?:"[^"]*"|'[^']*'|[^'">])*)>"#)
        .expect("start tag pattern is valid")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute pattern is valid")
});

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
        .expect("entity pattern is valid")
});

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</p\s*>").expect("line break pattern is valid")
});

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// One element located inside a fragment
#[derive(Debug, Clone)]
pub struct Element<'a> {
    src: &'a str,
    tag: String,
    attrs: &'a str,
    start: usize,
    open_end: usize,
    close_start: usize,
    end: usize,
}

impl<'a> Element<'a> {
    /// Lowercase tag name
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Byte range of the element including its own tags
    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// The element including its own tags
    pub fn outer(&self) -> &'a str {
        &self.src[self.start..self.end]
    }

    /// Markup between the opening and closing tags
    pub fn inner(&self) -> &'a str {
        &self.src[self.open_end..self.close_start]
    }

    /// Decoded attribute value. Bare attributes yield an empty string.
    pub fn attr(&self, name: &str) -> Option<String> {
        ATTRIBUTE.captures_iter(self.attrs).find_map(|caps| {
            let key = caps.get(1)?.as_str();
            if !key.eq_ignore_ascii_case(name) {
                return None;
            }
            let raw = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            Some(decode_entities(raw))
        })
    }

    /// Whether the `class` attribute contains `class` as a whole token
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|value| value.split_whitespace().any(|token| token == class))
            .unwrap_or(false)
    }

    /// Descendant elements, in document order
    pub fn descendants(&self) -> Vec<Element<'a>> {
        elements(self.inner())
    }

    /// Text content with tags removed and entities decoded
    pub fn text(&self) -> String {
        text_content(self.inner())
    }
}

/// All elements of a fragment, in document order of their start tags
pub fn elements(html: &str) -> Vec<Element<'_>> {
    let lower = html.to_ascii_lowercase();

    START_TAG
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let tag = caps.get(1)?.as_str().to_ascii_lowercase();
            let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let start = whole.start();
            let open_end = whole.end();

            let self_closing = attrs.trim_end().ends_with('/') || VOID_TAGS.contains(&tag.as_str());
            let (close_start, end) = if self_closing {
                (open_end, open_end)
            } else {
                find_close(&lower, &tag, open_end).unwrap_or((html.len(), html.len()))
            };

            Some(Element {
                src: html,
                tag,
                attrs,
                start,
                open_end,
                close_start,
                end,
            })
        })
        .collect()
}

/// Elements carrying `class` as a class token
pub fn find_by_class<'a>(html: &'a str, class: &str) -> Vec<Element<'a>> {
    elements(html)
        .into_iter()
        .filter(|el| el.has_class(class))
        .collect()
}

/// First element carrying `class`
pub fn first_by_class<'a>(html: &'a str, class: &str) -> Option<Element<'a>> {
    elements(html).into_iter().find(|el| el.has_class(class))
}

/// Elements with the given tag name
pub fn find_by_tag<'a>(html: &'a str, tag: &str) -> Vec<Element<'a>> {
    elements(html)
        .into_iter()
        .filter(|el| el.tag.eq_ignore_ascii_case(tag))
        .collect()
}

/// Locate the closing tag balancing the element opened just before `from`.
/// Returns `(close_start, close_end)`.
fn find_close(lower: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let open_pat = format!("<{tag}");
    let close_pat = format!("</{tag}");
    let mut depth = 1usize;
    let mut pos = from;

    while let Some(rel) = lower.get(pos..)?.find('<') {
        let at = pos + rel;
        let rest = &lower[at..];

        if rest.starts_with(&close_pat) && name_ends(rest, close_pat.len()) {
            depth -= 1;
            let close_end = rest.find('>').map(|i| at + i + 1).unwrap_or(lower.len());
            if depth == 0 {
                return Some((at, close_end));
            }
            pos = close_end;
            continue;
        }

        if rest.starts_with(&open_pat) && name_ends(rest, open_pat.len()) {
            depth += 1;
        }
        pos = at + 1;
    }

    None
}

fn name_ends(rest: &str, at: usize) -> bool {
    rest[at..]
        .chars()
        .next()
        .map(|c| c == '>' || c == '/' || c.is_whitespace())
        .unwrap_or(true)
}

/// Remove tags, keeping line breaks for `<br>` and paragraph ends
pub fn strip_tags(html: &str) -> String {
    let with_breaks = LINE_BREAK.replace_all(html, "\n");
    let mut out = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    for ch in with_breaks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Decode named and numeric character references
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    ENTITY
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "hellip" => Some('…'),
                    "mdash" => Some('—'),
                    "ndash" => Some('–'),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Collapse runs of horizontal whitespace and trim every line
pub fn normalize_ws(s: &str) -> String {
    s.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Readable text of a fragment
pub fn text_content(html: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(html)))
}
