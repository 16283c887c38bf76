//! model.rs: query and result shapes shared by every funnel stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FunnelError;
use crate::ingest::types::CandidateItem;
use crate::timeframe::TimeframeBucket;

pub const DEFAULT_MIN_ENGAGEMENT: i64 = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

/// One pipeline request. `topic` is always trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub topic: String,
    pub timeframe: TimeframeBucket,
    pub min_engagement: i64,
    pub similarity_threshold: f32,
}

impl Query {
    /// Validate and normalize. Fails before any collaborator is touched.
    pub fn new(
        topic: &str,
        timeframe: TimeframeBucket,
        min_engagement: i64,
        similarity_threshold: f32,
    ) -> Result<Self, FunnelError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(FunnelError::Validation(
                "topic must not be empty".to_string(),
            ));
        }
        if !similarity_threshold.is_finite() || !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(FunnelError::Validation(format!(
                "similarity threshold {similarity_threshold} is outside [0, 1]"
            )));
        }
        Ok(Self {
            topic: topic.to_lowercase(),
            timeframe,
            min_engagement,
            similarity_threshold,
        })
    }

    /// Query with the documented defaults for everything but the topic.
    pub fn with_defaults(topic: &str) -> Result<Self, FunnelError> {
        Self::new(
            topic,
            TimeframeBucket::default(),
            DEFAULT_MIN_ENGAGEMENT,
            DEFAULT_SIMILARITY_THRESHOLD,
        )
    }
}

/// A candidate that passed the relevance scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: CandidateItem,
    pub similarity_score: f32,
    /// e.g. "similarity score (0.90) ≥ threshold (0.70)"
    pub reason: String,
}

impl ScoredItem {
    pub fn id(&self) -> &str {
        &self.item.id
    }
}

/// What gets shown and persisted for each surviving item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    pub similarity_score: f32,
}

impl From<&ScoredItem> for ResultSummary {
    fn from(s: &ScoredItem) -> Self {
        Self {
            id: s.item.id.clone(),
            title: s.item.title.clone(),
            url: s.item.url.clone(),
            similarity_score: s.similarity_score,
        }
    }
}

/// Final output of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub topic: String,
    pub results: Vec<ResultSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Where a run ran dry. Empty outcomes are not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyStage {
    Ingestion,
    Prefilter,
    Relevance,
    Coarse,
}

impl EmptyStage {
    pub fn describe(self) -> &'static str {
        match self {
            EmptyStage::Ingestion => "no items returned by the source",
            EmptyStage::Prefilter => "no items within the selected timeframe and engagement threshold",
            EmptyStage::Relevance => "no items similar enough to the topic",
            EmptyStage::Coarse => "no items selected by the classification oracle",
        }
    }
}

/// Successful end of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(AnalysisResult),
    NoCandidates { stage: EmptyStage },
}

impl RunOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, RunOutcome::NoCandidates { .. })
    }
}
