//! Cleaning, scoring and summarizing an exported dataset

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use timeline_harvester::analysis::{
    clean_text, score_records, CleanPreset, DatasetSummary, HashtagPolicy, LexiconScorer,
    SentimentBreakdown, SentimentLabel,
};
use timeline_harvester::export::{read_dataset, ExportMerger, ExportMode};
use timeline_harvester::PostRecord;

fn post(id: &str, day: u32, text: &str) -> PostRecord {
    PostRecord {
        post_id: id.to_string(),
        text: text.to_string(),
        created_at: Some(Utc.with_ymd_and_hms(2024, 5, day, 9, 30, 0).unwrap()),
        lang: "en".to_string(),
        author_id_hashed: "0123456789abcdef".to_string(),
        retweet_count: 1,
        like_count: 10,
        comment_count: 2,
        is_reply: false,
        reply_to_id: None,
        is_retweet: false,
        is_quote: false,
        urls: Vec::new(),
        hashtags: Vec::new(),
        mentions: Vec::new(),
        media: Vec::new(),
    }
}

fn dataset() -> Vec<PostRecord> {
    let mut quote = post("3", 3, "This is not good at all https://t.co/x");
    quote.is_quote = true;
    let mut reply = post("4", 4, "@bob 🎉🎉");
    reply.is_reply = true;
    reply.reply_to_id = Some("1".to_string());
    reply.lang = "und".to_string();

    vec![
        post("1", 1, "I love this new release! #rust https://example.com"),
        post("2", 2, "Build failed again, terrible morning @ci_bot"),
        quote,
        reply,
    ]
}

#[test]
fn test_summary_of_exported_dataset() {
    let out = TempDir::new().unwrap();
    let outcome = ExportMerger::new(out.path())
        .export(&dataset(), "alice_tweets", ExportMode::Merge)
        .unwrap();
    let records = read_dataset(outcome.path().unwrap()).unwrap();

    let summary = DatasetSummary::from_records(&records, &CleanPreset::Standard.config());
    assert_eq!(summary.total_posts, 4);
    assert_eq!(summary.total_engagement, 4 * 13);
    assert_eq!(summary.types.quotes, 1);
    assert_eq!(summary.types.replies, 1);
    assert_eq!(summary.types.original, 2);
    assert_eq!(summary.empty_after_cleaning, 1);
    assert_eq!(summary.languages.get("en"), Some(&3));
    assert_eq!(summary.top_languages()[0], ("en", 3));

    let (first, last) = summary.date_range.unwrap();
    assert!(first < last);
    assert_eq!(first, Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap());
}

#[test]
fn test_sentiment_labels_follow_text() {
    let records = dataset();
    let scored = score_records(&records, &LexiconScorer::default(), &CleanPreset::Standard.config());

    let label = |id: &str| scored.iter().find(|s| s.post_id == id).unwrap().label;
    assert_eq!(label("1"), SentimentLabel::Positive);
    assert_eq!(label("2"), SentimentLabel::Negative);
    assert_eq!(label("3"), SentimentLabel::Negative);
    assert_eq!(label("4"), SentimentLabel::Neutral);

    let breakdown = SentimentBreakdown::from_scored(&scored);
    assert_eq!(breakdown.total, 4);
    assert_eq!((breakdown.positive, breakdown.neutral, breakdown.negative), (1, 1, 2));
    assert!((breakdown.percent(breakdown.negative) - 50.0).abs() < 1e-9);
    assert!(breakdown.mean.compound < 0.0);
}

#[test]
fn test_presets_and_hashtag_override() {
    let text = "RT @bob: Loving the #RustLang café 2024 ✨ https://x.io";

    assert_eq!(
        clean_text(text, &CleanPreset::Standard.config()),
        "loving the rustlang cafe 2024"
    );
    assert_eq!(
        clean_text(text, &CleanPreset::Aggressive.config()),
        "loving the cafe"
    );

    let mut drop_tags = CleanPreset::Standard.config();
    drop_tags.hashtags = HashtagPolicy::Complete;
    assert_eq!(clean_text(text, &drop_tags), "loving the cafe 2024");
}
