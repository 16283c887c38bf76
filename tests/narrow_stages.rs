// tests/narrow_stages.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use parking_lot::Mutex;
use relevance_funnel::analyze::oracle::OracleFuture;
use relevance_funnel::analyze::{MockOracle, Narrower, Oracle};
use relevance_funnel::{CandidateItem, ErrorKind, ScoredItem};

/// Replies with fixed text and records every prompt it sees.
#[derive(Default)]
struct ScriptedOracle {
    classify_reply: Option<String>,
    analyze_reply: Option<String>,
    classify_prompts: Mutex<Vec<String>>,
    analyze_prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    fn new(classify: Option<&str>, analyze: Option<&str>) -> Self {
        Self {
            classify_reply: classify.map(str::to_string),
            analyze_reply: analyze.map(str::to_string),
            ..Default::default()
        }
    }
}

impl Oracle for ScriptedOracle {
    fn classify<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        self.classify_prompts.lock().push(prompt.to_string());
        let reply = self.classify_reply.clone();
        Box::pin(async move { reply.ok_or_else(|| anyhow!("rate limited")) })
    }

    fn analyze<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        self.analyze_prompts.lock().push(prompt.to_string());
        let reply = self.analyze_reply.clone();
        Box::pin(async move { reply.ok_or_else(|| anyhow!("model overloaded")) })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

fn scored(ids: &[&str]) -> Vec<ScoredItem> {
    ids.iter()
        .map(|id| ScoredItem {
            item: CandidateItem {
                id: id.to_string(),
                source: "r/test".into(),
                title: format!("title {id}"),
                url: format!("https://reddit.test/{id}"),
                engagement_score: 10,
                created_at: Utc::now(),
                body: None,
                comments: vec![],
            },
            similarity_score: 0.8,
            reason: "similarity score (0.80) ≥ threshold (0.70)".into(),
        })
        .collect()
}

fn narrower(oracle: Arc<dyn Oracle>, initial: usize, top: usize) -> Narrower {
    Narrower::new(oracle, initial, top, Duration::from_secs(5))
}

#[tokio::test]
async fn coarse_ignores_fabricated_ids_and_keeps_input_order() {
    let oracle = Arc::new(ScriptedOracle::new(Some("c, zz9, a"), None));
    let n = narrower(oracle.clone(), 20, 10);
    let items = scored(&["a", "b", "c"]);

    let kept = n.coarse(&items).await.unwrap();
    let ids: Vec<&str> = kept.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(oracle.classify_prompts.lock().len(), 1);
}

#[tokio::test]
async fn coarse_caps_survivors_at_initial_limit() {
    let oracle = Arc::new(ScriptedOracle::new(Some("a,b,c,d,e"), None));
    let n = narrower(oracle, 3, 10);
    let kept = n.coarse(&scored(&["a", "b", "c", "d", "e"])).await.unwrap();
    assert_eq!(kept.len(), 3);
    assert_eq!(kept[2].id(), "c");
}

#[tokio::test]
async fn coarse_on_empty_input_skips_the_oracle() {
    let oracle = Arc::new(ScriptedOracle::new(Some("a"), None));
    let n = narrower(oracle.clone(), 20, 10);
    assert!(n.coarse(&[]).await.unwrap().is_empty());
    assert!(oracle.classify_prompts.lock().is_empty());
}

#[tokio::test]
async fn coarse_empty_reply_is_empty_not_error() {
    let oracle = Arc::new(ScriptedOracle::new(Some(""), None));
    let n = narrower(oracle, 20, 10);
    assert!(n.coarse(&scored(&["a"])).await.unwrap().is_empty());
}

#[tokio::test]
async fn coarse_failures_are_oracle_errors() {
    let failing = narrower(Arc::new(ScriptedOracle::new(None, None)), 20, 10);
    let err = failing.coarse(&scored(&["a"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Oracle);
    assert!(err.to_string().contains("rate limited"));

    let prose = narrower(
        Arc::new(ScriptedOracle::new(Some("I think a and b are best"), None)),
        20,
        10,
    );
    let err = prose.coarse(&scored(&["a", "b"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Oracle);
}

#[tokio::test]
async fn deep_sees_only_the_first_k_survivors_in_order() {
    let oracle = Arc::new(ScriptedOracle::new(None, Some("  Key insight: demand is up.  ")));
    let n = narrower(oracle.clone(), 20, 2);
    let survivors = scored(&["x1", "x2", "x3"]);

    let text = n.deep("ecommerce", &survivors).await.unwrap();
    assert_eq!(text, "Key insight: demand is up.");

    let prompts = oracle.analyze_prompts.lock();
    assert_eq!(prompts.len(), 1);
    let p = &prompts[0];
    assert!(p.contains("ecommerce"));
    let first = p.find("Post ID: x1").expect("x1 in prompt");
    let second = p.find("Post ID: x2").expect("x2 in prompt");
    assert!(first < second);
    assert!(!p.contains("Post ID: x3"));

    let top: Vec<&str> = n.deep_input(&survivors).iter().map(|s| s.id()).collect();
    assert_eq!(top, vec!["x1", "x2"]);
}

#[tokio::test]
async fn deep_blank_or_failed_reply_is_an_oracle_error() {
    let blank = narrower(Arc::new(ScriptedOracle::new(None, Some("  \n"))), 20, 10);
    let err = blank.deep("t", &scored(&["a"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Oracle);

    let failing = narrower(Arc::new(ScriptedOracle::new(None, None)), 20, 10);
    let err = failing.deep("t", &scored(&["a"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Oracle);
}

#[tokio::test]
async fn mock_oracle_drives_both_stages() {
    let n = narrower(Arc::new(MockOracle { pick: 2 }), 20, 10);
    let kept = n.coarse(&scored(&["m1", "m2", "m3"])).await.unwrap();
    assert_eq!(kept.len(), 2);
    let text = n.deep("topic", &kept).await.unwrap();
    assert!(text.contains("2 posts"));
}

#[tokio::test]
async fn coarse_accepts_ids_echoed_with_their_prompt_prefix() {
    let oracle = Arc::new(ScriptedOracle::new(Some("Post ID: c\nPost ID: a"), None));
    let n = narrower(oracle, 20, 10);
    let kept = n.coarse(&scored(&["a", "b", "c"])).await.unwrap();
    let ids: Vec<&str> = kept.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}
