//! filter.rs: engagement threshold and the timeframe ∧ threshold pre-filter.
//! Both are pure and order-preserving.

use chrono::{DateTime, Utc};

use crate::ingest::types::CandidateItem;
use crate::timeframe::TimeframeBucket;

/// Keep items with `engagement_score >= min_engagement`.
pub fn filter_by_engagement(items: &[CandidateItem], min_engagement: i64) -> Vec<CandidateItem> {
    items
        .iter()
        .filter(|it| it.engagement_score >= min_engagement)
        .cloned()
        .collect()
}

/// Keep items that satisfy BOTH the engagement threshold and the timeframe bucket.
pub fn prefilter(
    items: &[CandidateItem],
    bucket: TimeframeBucket,
    min_engagement: i64,
    now: DateTime<Utc>,
) -> Vec<CandidateItem> {
    items
        .iter()
        .filter(|it| it.engagement_score >= min_engagement && bucket.contains_age(it.age_secs(now)))
        .cloned()
        .collect()
}
