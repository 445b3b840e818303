//! Text cleaning pipeline
//!
//! Steps run in a fixed order; each one is switched by [`CleanConfig`]:
//!
//! 1. newlines to spaces (always)
//! 2. leading `RT` / `RT:` prefix
//! 3. URLs
//! 4. mentions
//! 5. hashtags ([`HashtagPolicy`])
//! 6. emoji
//! 7. accent folding (`é` to `e`)
//! 8. special characters (keeps ASCII letters, digits, whitespace and `.,!?'"-`)
//! 9. numbers
//! 10. lowercase
//! 11. whitespace collapse (always)

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

static RT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^RT\s*:?\s*").expect("rt pattern is valid"));
static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url pattern is valid"));
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("mention pattern is valid"));
static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").expect("hashtag pattern is valid"));
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\p{Emoji_Modifier}\x{1F1E6}-\x{1F1FF}\x{FE0F}\x{200D}\x{20E3}]")
        .expect("emoji pattern is valid")
});
static SPECIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^a-zA-Z0-9\s.,!?'"-]"#).expect("special pattern is valid"));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("number pattern is valid"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// What happens to hashtags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashtagPolicy {
    /// Drop the `#`, keep the word
    Symbol,
    /// Drop the whole hashtag
    Complete,
    /// Leave hashtags alone
    Keep,
}

impl FromStr for HashtagPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "symbol" => Ok(HashtagPolicy::Symbol),
            "complete" => Ok(HashtagPolicy::Complete),
            "keep" | "none" => Ok(HashtagPolicy::Keep),
            _ => Err(format!(
                "Invalid hashtag policy: {s}. Valid options: symbol, complete, keep"
            )),
        }
    }
}

/// Cleaning switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Strip a leading retweet marker
    pub remove_rt_prefix: bool,
    /// Strip links
    pub remove_urls: bool,
    /// Strip `@handle` mentions
    pub remove_mentions: bool,
    /// Hashtag handling
    pub hashtags: HashtagPolicy,
    /// Strip emoji
    pub remove_emojis: bool,
    /// Fold accented Latin letters to ASCII
    pub fold_accents: bool,
    /// Strip anything but letters, digits, whitespace and basic punctuation
    pub remove_special_chars: bool,
    /// Strip digit runs
    pub remove_numbers: bool,
    /// Lowercase the result
    pub lowercase: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        CleanPreset::Standard.config()
    }
}

/// Named cleaning configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanPreset {
    /// URLs, mentions, hashtag symbols, emoji and special characters removed, lowercased
    #[default]
    Standard,
    /// Only URLs removed
    Minimal,
    /// Everything removed including hashtags and numbers, lowercased
    Aggressive,
}

impl CleanPreset {
    /// Switches for this preset
    pub fn config(&self) -> CleanConfig {
        let standard = CleanConfig {
            remove_rt_prefix: true,
            remove_urls: true,
            remove_mentions: true,
            hashtags: HashtagPolicy::Symbol,
            remove_emojis: true,
            fold_accents: true,
            remove_special_chars: true,
            remove_numbers: false,
            lowercase: true,
        };
        match self {
            CleanPreset::Standard => standard,
            CleanPreset::Minimal => CleanConfig {
                remove_mentions: false,
                hashtags: HashtagPolicy::Keep,
                remove_emojis: false,
                fold_accents: false,
                remove_special_chars: false,
                lowercase: false,
                ..standard
            },
            CleanPreset::Aggressive => CleanConfig {
                hashtags: HashtagPolicy::Complete,
                remove_numbers: true,
                ..standard
            },
        }
    }
}

impl FromStr for CleanPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(CleanPreset::Standard),
            "minimal" => Ok(CleanPreset::Minimal),
            "aggressive" => Ok(CleanPreset::Aggressive),
            _ => Err(format!(
                "Invalid clean preset: {s}. Valid options: standard, minimal, aggressive"
            )),
        }
    }
}

/// Run the cleaning pipeline over `text`
pub fn clean_text(text: &str, config: &CleanConfig) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut text = text.replace(['\n', '\r'], " ");

    if config.remove_rt_prefix {
        text = RT_PREFIX.replace(&text, "").into_owned();
    }
    if config.remove_urls {
        text = URL.replace_all(&text, "").into_owned();
    }
    if config.remove_mentions {
        text = MENTION.replace_all(&text, "").into_owned();
    }
    text = match config.hashtags {
        HashtagPolicy::Symbol => HASHTAG.replace_all(&text, "$1").into_owned(),
        HashtagPolicy::Complete => HASHTAG.replace_all(&text, "").into_owned(),
        HashtagPolicy::Keep => text,
    };
    if config.remove_emojis {
        text = EMOJI.replace_all(&text, "").into_owned();
    }
    if config.fold_accents {
        text = text.chars().map(fold_accent).collect();
    }
    if config.remove_special_chars {
        text = SPECIAL.replace_all(&text, "").into_owned();
    }
    if config.remove_numbers {
        text = NUMBER.replace_all(&text, "").into_owned();
    }
    if config.lowercase {
        text = text.to_lowercase();
    }

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Base letter of an accented Latin letter, the char itself otherwise
fn fold_accent(c: char) -> char {
    match c {
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'ç' | 'ć' | 'č' => 'c',
        'Ç' | 'Ć' | 'Č' => 'C',
        'ď' => 'd',
        'Ď' => 'D',
        'è'..='ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'È'..='Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'ì'..='ï' | 'ī' | 'į' => 'i',
        'Ì'..='Ï' | 'Ī' | 'Į' => 'I',
        'ñ' | 'ń' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'ò'..='ö' | 'ø' | 'ō' | 'ő' => 'o',
        'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ő' => 'O',
        'ř' => 'r',
        'Ř' => 'R',
        'ś' | 'š' | 'ş' => 's',
        'Ś' | 'Š' | 'Ş' => 'S',
        'ť' | 'ţ' => 't',
        'Ť' | 'Ţ' => 'T',
        'ù'..='ü' | 'ū' | 'ů' | 'ű' | 'ų' => 'u',
        'Ù'..='Ü' | 'Ū' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' | 'Ÿ' => 'Y',
        'ź' | 'ż' | 'ž' => 'z',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        _ => c,
    }
}

/// Whitespace-separated word count
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
