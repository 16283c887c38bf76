// tests/metrics_pipeline.rs
#![cfg(feature = "strict-metrics")]
use std::sync::Arc;

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use relevance_funnel::analyze::MockOracle;
use relevance_funnel::config::PipelineConfig;
use relevance_funnel::history::HistoryStore;
use relevance_funnel::ingest::providers::fixture::StaticSource;
use relevance_funnel::{CandidateItem, Pipeline, Query};

#[tokio::test]
async fn metrics_exposed_after_a_run() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("recorder");

    let items = vec![CandidateItem {
        id: "m1".into(),
        source: "r/ecommerce".into(),
        title: "Ecommerce fraud on the rise".into(),
        url: "https://reddit.test/m1".into(),
        engagement_score: 50,
        created_at: Utc::now(),
        body: None,
        comments: vec![],
    }];
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        Arc::new(StaticSource::new(items)),
        Arc::new(MockOracle::default()),
        HistoryStore::in_memory(),
    );
    let q = Query::with_defaults("ecommerce").unwrap();
    assert!(pipeline.run(&q).await.is_ok());

    let out = handle.render();
    for needle in [
        "funnel_items_fetched_total",
        "funnel_items_prefiltered_total",
        "funnel_items_relevant_total",
        "funnel_oracle_calls_total",
        "funnel_runs_total",
        "funnel_run_ms",
    ] {
        assert!(out.contains(needle), "missing {needle} in:\n{out}");
    }
}
