// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Query;

/// A single fetched content unit (discussion post or article link) before filtering.
/// Constructed by a source adapter; only `comments` is filled in later, for items that
/// pass relevance scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub id: String,     // unique within `source`
    pub source: String, // e.g. "r/ecommerce", "https://www.bbc.com/news/business"
    pub title: String,
    pub url: String,
    pub engagement_score: i64, // upvotes; 0 when the source has no notion of it
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Comment bodies in retrieval order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
}

impl CandidateItem {
    /// Age in seconds relative to `now`. Negative for items dated in the future.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }

    /// Visible text used for relevance scoring (the title).
    pub fn visible_text(&self) -> &str {
        &self.title
    }
}

/// Item source collaborator. Implementations must honour `query.min_engagement`
/// where the remote API allows it and never return more than `max_items`.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_items(&self, query: &Query, max_items: usize) -> Result<Vec<CandidateItem>>;

    /// Discussion text for one item, loaded only for items that survived relevance
    /// scoring. The default keeps whatever the item was fetched with.
    async fn fetch_comments(&self, item: &CandidateItem) -> Result<Vec<String>> {
        Ok(item.comments.clone())
    }

    fn name(&self) -> &'static str;
}
