//! Language tagging.
//!
//! The extractor only needs a best-effort ISO 639-1 code, so detection sits
//! behind [`LanguageDetector`] and the built-in [`ScriptDetector`] uses
//! Unicode script ranges plus stopword counts for common Latin-script
//! languages. Anything it is not confident about is reported as unknown.

/// Best-effort language identification
pub trait LanguageDetector {
    /// ISO 639-1 code for `text`, or `None` when unknown
    fn detect(&self, text: &str) -> Option<String>;
}

impl<T: LanguageDetector + ?Sized> LanguageDetector for std::sync::Arc<T> {
    fn detect(&self, text: &str) -> Option<String> {
        (**self).detect(text)
    }
}

/// Script and stopword heuristic detector
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptDetector;

const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &["the", "and", "is", "are", "to", "of", "in", "that", "it", "for", "you", "this", "with", "was", "have", "be", "not"],
    ),
    (
        "es",
        &["el", "la", "los", "las", "que", "y", "es", "por", "para", "con", "una", "del", "pero", "muy", "como"],
    ),
    (
        "fr",
        &["le", "la", "les", "et", "est", "que", "une", "des", "pour", "pas", "dans", "avec", "sur", "je", "mais"],
    ),
    (
        "de",
        &["der", "die", "das", "und", "ist", "nicht", "ich", "mit", "ein", "eine", "auf", "für", "sie", "auch", "wir"],
    ),
    (
        "pt",
        &["o", "os", "que", "e", "é", "não", "uma", "para", "com", "mais", "por", "mas", "muito", "isso", "você"],
    ),
    (
        "it",
        &["il", "che", "e", "è", "non", "per", "una", "sono", "della", "con", "ma", "anche", "questo", "gli", "come"],
    ),
];

#[derive(Default)]
struct ScriptCounts {
    latin: usize,
    kana: usize,
    hangul: usize,
    han: usize,
    cyrillic: usize,
    arabic: usize,
    hebrew: usize,
    greek: usize,
    thai: usize,
    devanagari: usize,
}

impl ScriptCounts {
    fn tally(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            match c as u32 {
                0x0041..=0x024F => counts.latin += 1,
                0x0370..=0x03FF => counts.greek += 1,
                0x0400..=0x04FF => counts.cyrillic += 1,
                0x0590..=0x05FF => counts.hebrew += 1,
                0x0600..=0x06FF | 0x0750..=0x077F => counts.arabic += 1,
                0x0900..=0x097F => counts.devanagari += 1,
                0x0E00..=0x0E7F => counts.thai += 1,
                0x3040..=0x30FF => counts.kana += 1,
                0xAC00..=0xD7AF | 0x1100..=0x11FF => counts.hangul += 1,
                0x4E00..=0x9FFF | 0x3400..=0x4DBF => counts.han += 1,
                _ => {}
            }
        }
        counts
    }

    fn dominant_non_latin(&self) -> Option<&'static str> {
        // Kana wins over Han: Japanese text mixes both.
        if self.kana > 0 {
            return Some("ja");
        }
        let candidates = [
            (self.hangul, "ko"),
            (self.han, "zh"),
            (self.cyrillic, "ru"),
            (self.arabic, "ar"),
            (self.hebrew, "he"),
            (self.greek, "el"),
            (self.thai, "th"),
            (self.devanagari, "hi"),
        ];
        candidates
            .into_iter()
            .filter(|(count, _)| *count > 0 && *count >= self.latin)
            .max_by_key(|(count, _)| *count)
            .map(|(_, code)| code)
    }
}

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let counts = ScriptCounts::tally(text);
        if let Some(code) = counts.dominant_non_latin() {
            return Some(code.to_string());
        }
        if counts.latin == 0 {
            return None;
        }

        let without_links = super::entities::strip_urls(text);
        let words: Vec<String> = without_links
            .split(|c: char| !(c.is_alphanumeric() || c == '@' || c == '#' || c == ':' || c == '/'))
            .filter(|w| !w.is_empty() && !w.starts_with('@') && !w.starts_with('#') && !w.contains("://"))
            .map(str::to_lowercase)
            .collect();

        let mut best: Option<(&str, usize)> = None;
        let mut tied = false;
        for (code, stopwords) in STOPWORDS {
            let score = words
                .iter()
                .filter(|w| stopwords.contains(&w.as_str()))
                .count();
            match best {
                Some((_, top)) if score == top => tied = true,
                Some((_, top)) if score < top => {}
                _ => {
                    best = Some((*code, score));
                    tied = false;
                }
            }
        }

        match best {
            Some((code, score)) if score > 0 && !tied => Some(code.to_string()),
            _ => None,
        }
    }
}
