// tests/history_store.rs
use std::fs;

use relevance_funnel::history::HistoryStore;
use relevance_funnel::{ErrorKind, ResultSummary};

fn summary(id: &str) -> ResultSummary {
    ResultSummary {
        id: id.into(),
        title: format!("Headline {id}"),
        url: format!("https://news.test/{id}"),
        similarity_score: 0.91,
    }
}

#[test]
fn missing_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::file(dir.path().join("nope.jsonl"));
    assert!(store.load_all().unwrap().is_empty());
    assert!(store.find_by_topic("anything").unwrap().is_none());
    assert!(store.topics().unwrap().is_empty());
}

#[test]
fn append_then_load_from_a_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history.jsonl");

    {
        let store = HistoryStore::file(&path);
        store
            .append("ecommerce", vec![summary("a"), summary("b")], Some("Growth.".into()))
            .unwrap();
        store.append("rust", vec![summary("c")], None).unwrap();
        store.append("ecommerce", vec![], Some("Later run.".into())).unwrap();
    }

    let reopened = HistoryStore::file(&path);
    let all = reopened.load_all().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].topic, "ecommerce");
    assert_eq!(all[1].topic, "rust");

    let first = reopened.find_by_topic("ecommerce").unwrap().unwrap();
    assert_eq!(first.results.len(), 2);
    assert_eq!(first.narrative.as_deref(), Some("Growth."));
    assert_eq!(
        reopened.topics().unwrap(),
        vec!["ecommerce".to_string(), "rust".to_string()]
    );

    let raw = fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 3);
}

#[test]
fn malformed_line_in_the_middle_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");
    let store = HistoryStore::file(&path);
    store.append("ok", vec![summary("a")], None).unwrap();

    let mut raw = fs::read_to_string(&path).unwrap();
    raw.push_str("{not json\n");
    fs::write(&path, raw).unwrap();
    store.append("later", vec![], None).unwrap();

    let err = store.load_all().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.to_string().contains("line 2"), "{err}");
}

#[test]
fn torn_last_line_is_skipped_and_repaired_on_next_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");
    let store = HistoryStore::file(&path);
    store.append("a", vec![summary("a1")], None).unwrap();

    // interrupted write: no closing newline
    let mut raw = fs::read_to_string(&path).unwrap();
    raw.push_str(r#"{"topic":"b","res"#);
    fs::write(&path, raw).unwrap();

    let before = store.load_all().unwrap();
    assert_eq!(before.len(), 1);
    assert!(store.find_by_topic("a").unwrap().is_some());

    store.append("c", vec![summary("c1")], Some("kept".into())).unwrap();
    let after = store.load_all().unwrap();
    let topics: Vec<&str> = after.iter().map(|e| e.topic.as_str()).collect();
    assert_eq!(topics, vec!["a", "c"]);
    assert_eq!(
        store.find_by_topic("c").unwrap().unwrap().narrative.as_deref(),
        Some("kept")
    );

    let raw = fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 2);
    assert!(raw.ends_with('\n'));
}

#[test]
fn unwritable_location_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    // a regular file where the parent directory should be
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "x").unwrap();
    let store = HistoryStore::file(blocker.join("history.jsonl"));

    let err = store.append("t", vec![], None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
}
