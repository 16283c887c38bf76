// src/analyze/narrow.rs
//! Two-stage narrowing: COARSE asks the oracle to pick "good" ids out of the whole
//! scored set, DEEP asks for an analysis of the first `top_posts_for_analysis`
//! survivors. Stages run once each, in that order, with no state kept between runs.

use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use metrics::{counter, histogram};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::analyze::oracle::{DynOracle, OracleFuture};
use crate::analyze::prompt::{coarse_prompt, deep_prompt, POST_ID_PREFIX};
use crate::error::FunnelError;
use crate::model::ScoredItem;

pub const DEFAULT_INITIAL_GOOD_POST_LIMIT: usize = 20;
pub const DEFAULT_TOP_POSTS_FOR_ANALYSIS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrowStage {
    Coarse,
    Deep,
}

impl NarrowStage {
    fn as_str(self) -> &'static str {
        match self {
            NarrowStage::Coarse => "coarse",
            NarrowStage::Deep => "deep",
        }
    }
}

/// Drop a leading "Post ID:" echoed back from the prompt (any case).
fn strip_id_prefix(token: &str) -> &str {
    let prefix = POST_ID_PREFIX.trim_end();
    match token.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => token[prefix.len()..].trim_start(),
        _ => token,
    }
}

/// Parse the oracle's id list. Ids are separated by commas and/or newlines; each is
/// trimmed of whitespace, quotes, brackets and a trailing period. An empty response
/// is an empty list. A token with inner whitespace means the oracle answered in
/// prose, which is unparsable.
pub fn parse_id_list(response: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for raw in response.split([',', '\n', '\r']) {
        let token = strip_id_prefix(raw.trim())
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '[' | ']' | '(' | ')'))
            .trim_end_matches('.')
            .trim();
        if token.is_empty() {
            continue;
        }
        if token.chars().any(char::is_whitespace) {
            bail!("unparsable id list (found `{token}`)");
        }
        ids.push(token.to_string());
    }
    Ok(ids)
}

pub struct Narrower {
    oracle: DynOracle,
    initial_good_post_limit: usize,
    top_posts_for_analysis: usize,
    timeout: Duration,
}

impl Narrower {
    pub fn new(
        oracle: DynOracle,
        initial_good_post_limit: usize,
        top_posts_for_analysis: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            initial_good_post_limit: initial_good_post_limit.max(1),
            top_posts_for_analysis: top_posts_for_analysis.max(1),
            timeout,
        }
    }

    pub fn top_posts_for_analysis(&self) -> usize {
        self.top_posts_for_analysis
    }

    async fn call(&self, stage: NarrowStage, fut: OracleFuture<'_>) -> Result<String> {
        counter!("funnel_oracle_calls_total", "stage" => stage.as_str()).increment(1);
        let t0 = Instant::now();
        let res = match tokio::time::timeout(self.timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(anyhow!(
                "{} stage timed out after {}s",
                stage.as_str(),
                self.timeout.as_secs()
            )),
        };
        histogram!("funnel_oracle_ms", "stage" => stage.as_str())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        if res.is_err() {
            counter!("funnel_oracle_errors_total", "stage" => stage.as_str()).increment(1);
        }
        res
    }

    /// COARSE: keep the items whose id the oracle returned, in input order, at most
    /// `initial_good_post_limit` of them. Ids not present in `items` are ignored.
    pub async fn coarse(&self, items: &[ScoredItem]) -> Result<Vec<ScoredItem>, FunnelError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = coarse_prompt(items, self.initial_good_post_limit);
        let response = self
            .call(NarrowStage::Coarse, self.oracle.classify(&prompt))
            .await
            .map_err(|e| {
                warn!(target: "funnel::narrow", provider = self.oracle.provider_name(), error = %format!("{e:#}"), "coarse selection failed");
                FunnelError::oracle_failure(e.context("coarse selection"))
            })?;

        let ids = parse_id_list(&response)
            .map_err(|e| FunnelError::oracle_failure(e.context("coarse selection")))?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let survivors: Vec<ScoredItem> = items
            .iter()
            .filter(|s| wanted.contains(s.id()))
            .take(self.initial_good_post_limit)
            .cloned()
            .collect();

        let unknown = ids
            .iter()
            .filter(|id| !items.iter().any(|s| s.id() == id.as_str()))
            .count();
        info!(
            target: "funnel::narrow",
            candidates = items.len(),
            returned = ids.len(),
            unknown,
            kept = survivors.len(),
            "coarse selection done"
        );
        Ok(survivors)
    }

    /// The slice DEEP looks at: the first `top_posts_for_analysis` survivors, unreordered.
    pub fn deep_input<'a>(&self, survivors: &'a [ScoredItem]) -> &'a [ScoredItem] {
        &survivors[..survivors.len().min(self.top_posts_for_analysis)]
    }

    /// DEEP: free-text analysis of `deep_input(survivors)`, trimmed.
    pub async fn deep(&self, topic: &str, survivors: &[ScoredItem]) -> Result<String, FunnelError> {
        let top = self.deep_input(survivors);
        let prompt = deep_prompt(topic, top);
        let text = self
            .call(NarrowStage::Deep, self.oracle.analyze(&prompt))
            .await
            .map_err(|e| {
                warn!(target: "funnel::narrow", provider = self.oracle.provider_name(), error = %format!("{e:#}"), "deep analysis failed");
                FunnelError::oracle_failure(e.context("deep analysis"))
            })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(FunnelError::Oracle(
                "deep analysis: oracle returned empty analysis".to_string(),
            ));
        }
        info!(target: "funnel::narrow", analyzed = top.len(), chars = text.len(), "deep analysis done");
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_accepts_commas_newlines_and_noise() {
        let ids = parse_id_list(" a1, 'b2',\n[c3]\n\n d4. ,").unwrap();
        assert_eq!(ids, vec!["a1", "b2", "c3", "d4"]);
    }

    #[test]
    fn echoed_post_id_prefix_is_stripped() {
        let ids = parse_id_list("Post ID: abc1\npost id: 'def2',POST ID:ghi3").unwrap();
        assert_eq!(ids, vec!["abc1", "def2", "ghi3"]);
    }

    #[test]
    fn empty_response_is_empty_list() {
        assert!(parse_id_list("  \n ").unwrap().is_empty());
    }

    #[test]
    fn prose_is_unparsable() {
        assert!(parse_id_list("Sure! Here are the best posts: a1, b2").is_err());
    }
}
