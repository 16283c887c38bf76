// src/relevance.rs
//! Relevance scorer: similarity between the query topic and each item's visible text,
//! kept when the score meets the threshold.
//!
//! The metric is pluggable (`SimilarityMetric`). Two are provided:
//! - `LexicalRatio` (default): `strsim::normalized_levenshtein`, best token window.
//! - `TokenCosine`: cosine over term-frequency vectors.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strsim::normalized_levenshtein;
use tracing::{debug, info, warn};

use crate::ingest::types::CandidateItem;
use crate::model::ScoredItem;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = crate::model::DEFAULT_SIMILARITY_THRESHOLD;

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"));

/// Lower-cased `\w+` tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    RE_WORD
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/* ----------------------------
Metrics
---------------------------- */

/// Text similarity in [0, 1]. Implementations must be symmetric (within float
/// tolerance) and bounded.
pub trait SimilarityMetric: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f32;
    fn name(&self) -> &'static str;
}

/// Normalized Levenshtein ratio. When one side has fewer tokens, the shorter text is
/// compared against every same-length token window of the longer one and the best
/// ratio wins, so "ecommerce" inside a long headline still scores high.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRatio;

impl SimilarityMetric for LexicalRatio {
    fn similarity(&self, a: &str, b: &str) -> f32 {
        let ta = tokenize(a);
        let tb = tokenize(b);
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }
        let (short, long) = if ta.len() <= tb.len() { (ta, tb) } else { (tb, ta) };

        let short_text = short.join(" ");
        let mut best = normalized_levenshtein(&short_text, &long.join(" "));
        if short.len() < long.len() {
            for window in long.windows(short.len()) {
                let sim = normalized_levenshtein(&short_text, &window.join(" "));
                if sim > best {
                    best = sim;
                }
            }
        }
        (best as f32).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

/// Cosine similarity of term-frequency vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCosine;

impl SimilarityMetric for TokenCosine {
    fn similarity(&self, a: &str, b: &str) -> f32 {
        fn tf(s: &str) -> HashMap<String, f64> {
            let mut m = HashMap::new();
            for t in tokenize(s) {
                *m.entry(t).or_insert(0.0) += 1.0;
            }
            m
        }
        let va = tf(a);
        let vb = tf(b);
        if va.is_empty() || vb.is_empty() {
            return 0.0;
        }
        let dot: f64 = va
            .iter()
            .filter_map(|(k, x)| vb.get(k).map(|y| x * y))
            .sum();
        let na = va.values().map(|x| x * x).sum::<f64>().sqrt();
        let nb = vb.values().map(|x| x * x).sum::<f64>().sqrt();
        ((dot / (na * nb)) as f32).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "cosine"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Lexical,
    Cosine,
}

pub fn build_metric(kind: MetricKind) -> Arc<dyn SimilarityMetric> {
    match kind {
        MetricKind::Lexical => Arc::new(LexicalRatio),
        MetricKind::Cosine => Arc::new(TokenCosine),
    }
}

/* ----------------------------
Scorer
---------------------------- */

pub fn justification(score: f32, threshold: f32) -> String {
    format!("similarity score ({score:.2}) ≥ threshold ({threshold:.2})")
}

#[derive(Clone)]
pub struct RelevanceScorer {
    metric: Arc<dyn SimilarityMetric>,
}

impl RelevanceScorer {
    pub fn new(metric: Arc<dyn SimilarityMetric>) -> Self {
        Self { metric }
    }

    pub fn metric_name(&self) -> &'static str {
        self.metric.name()
    }

    /// Score one item. `None` when the visible text is empty or whitespace-only.
    pub fn score_one(&self, topic: &str, item: &CandidateItem) -> Option<f32> {
        let text = item.visible_text().trim();
        if text.is_empty() {
            return None;
        }
        let s = self.metric.similarity(topic, text);
        Some(if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 })
    }

    /// Score every item, keep those with `score >= threshold`, preserving input order.
    /// Emits one summary line per source page: warn when nothing matched, info otherwise.
    pub fn score_items(
        &self,
        topic: &str,
        items: &[CandidateItem],
        threshold: f32,
    ) -> Vec<ScoredItem> {
        let mut out = Vec::new();
        // (source, matches, checked) in first-seen order
        let mut pages: Vec<(String, usize, usize)> = Vec::new();

        for item in items {
            let page_idx = match pages.iter().position(|(s, _, _)| *s == item.source) {
                Some(i) => i,
                None => {
                    pages.push((item.source.clone(), 0, 0));
                    pages.len() - 1
                }
            };
            pages[page_idx].2 += 1;

            let Some(score) = self.score_one(topic, item) else {
                continue;
            };
            counter!("funnel_items_scored_total").increment(1);
            let passed = score >= threshold;
            debug!(
                target: "funnel::relevance",
                id = %item.id,
                title = %item.title,
                url = %item.url,
                score = format_args!("{score:.2}"),
                passed,
                "scored item"
            );
            if passed {
                pages[page_idx].1 += 1;
                out.push(ScoredItem {
                    item: item.clone(),
                    similarity_score: score,
                    reason: justification(score, threshold),
                });
            }
        }

        for (source, matches, checked) in &pages {
            if *matches == 0 {
                warn!(
                    target: "funnel::relevance",
                    topic, %source, checked, "no matches for topic"
                );
            } else {
                info!(
                    target: "funnel::relevance",
                    topic, %source, matches, checked, "found matches"
                );
            }
        }
        counter!("funnel_items_relevant_total").increment(out.len() as u64);
        out
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(Arc::new(LexicalRatio))
    }
}

/* ----------------------------
Tests
---------------------------- */
