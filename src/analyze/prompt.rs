// src/analyze/prompt.rs
//! Prompt text for the two narrowing stages.

use crate::model::ScoredItem;

pub const POST_ID_PREFIX: &str = "Post ID: ";
/// Comments quoted per item in a summary.
pub const SUMMARY_COMMENTS: usize = 3;

/// Brief per-item summary: id, title, scores and the first few comments.
pub fn summarize_item(s: &ScoredItem) -> String {
    let comments = s
        .item
        .comments
        .iter()
        .take(SUMMARY_COMMENTS)
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{POST_ID_PREFIX}{}\nTitle: {}\nScore: {}\nSimilarity: {:.2}\nFirst {SUMMARY_COMMENTS} Comments:\n{}\n------\n",
        s.item.id, s.item.title, s.item.engagement_score, s.similarity_score, comments
    )
}

pub fn coarse_prompt(items: &[ScoredItem], limit: usize) -> String {
    let summaries: String = items.iter().map(summarize_item).collect();
    format!(
        "Identify up to {limit} good posts.\n\nHere are the posts:\n{summaries}\nReturn only a comma-separated list of post IDs without any additional text.\n"
    )
}

pub fn deep_prompt(topic: &str, items: &[ScoredItem]) -> String {
    let summaries = items
        .iter()
        .map(summarize_item)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Analyze these posts about \"{topic}\". Summarize the key insights, emerging trends and practical recommendations.\n\n{summaries}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::CandidateItem;
    use chrono::Utc;

    #[test]
    fn summary_quotes_only_first_comments() {
        let s = ScoredItem {
            item: CandidateItem {
                id: "k9".into(),
                source: "r/test".into(),
                title: "Hello".into(),
                url: "https://x.test".into(),
                engagement_score: 12,
                created_at: Utc::now(),
                body: None,
                comments: vec!["c1".into(), "c2".into(), "c3".into(), "c4".into()],
            },
            similarity_score: 0.8,
            reason: String::new(),
        };
        let text = summarize_item(&s);
        assert!(text.starts_with("Post ID: k9\nTitle: Hello\nScore: 12\n"));
        assert!(text.contains("c3"));
        assert!(!text.contains("c4"));
    }
}
