// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{CandidateItem, SourceAdapter};
use crate::model::Query;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::time::Duration;

/// One-time metrics registration (so series show up once a recorder is installed).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "funnel_items_fetched_total",
            "Items returned by source adapters."
        );
        describe_counter!(
            "funnel_items_prefiltered_total",
            "Items kept by the timeframe + engagement pre-filter."
        );
        describe_counter!(
            "funnel_items_scored_total",
            "Items that received a similarity score."
        );
        describe_counter!(
            "funnel_items_relevant_total",
            "Items at or above the similarity threshold."
        );
        describe_counter!("funnel_oracle_calls_total", "Oracle requests issued.");
        describe_counter!("funnel_oracle_errors_total", "Oracle requests that failed.");
        describe_counter!("funnel_runs_total", "Pipeline runs started.");
        describe_histogram!("funnel_run_ms", "Pipeline run duration in milliseconds.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Drop repeated ids (first occurrence wins) and cap the result at `max_items`.
pub fn dedup_and_cap(items: Vec<CandidateItem>, max_items: usize) -> Vec<CandidateItem> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::with_capacity(items.len().min(max_items));
    for it in items {
        if out.len() >= max_items {
            break;
        }
        if seen.insert((it.source.clone(), it.id.clone())) {
            out.push(it);
        }
    }
    out
}

/// Fetch once from `source` under a deadline. An elapsed deadline is reported as an
/// ordinary error so callers can map it to a source failure.
pub async fn fetch_with_timeout(
    source: &dyn SourceAdapter,
    query: &Query,
    max_items: usize,
    timeout: Duration,
) -> anyhow::Result<Vec<CandidateItem>> {
    ensure_metrics_described();
    let items = match tokio::time::timeout(timeout, source.fetch_items(query, max_items)).await {
        Ok(res) => res?,
        Err(_) => anyhow::bail!(
            "source `{}` timed out after {}s",
            source.name(),
            timeout.as_secs()
        ),
    };
    let items = dedup_and_cap(items, max_items);
    counter!("funnel_items_fetched_total").increment(items.len() as u64);
    tracing::info!(
        target: "funnel::ingest",
        source = source.name(),
        fetched = items.len(),
        "source fetch finished"
    );
    Ok(items)
}
