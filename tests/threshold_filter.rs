// tests/threshold_filter.rs
use chrono::{Duration, Utc};
use rand::Rng;
use relevance_funnel::filter::{filter_by_engagement, prefilter};
use relevance_funnel::{CandidateItem, TimeframeBucket};

fn item(id: usize, score: i64, age_hours: i64) -> CandidateItem {
    CandidateItem {
        id: format!("p{id}"),
        source: "r/test".into(),
        title: format!("post {id}"),
        url: format!("https://reddit.test/{id}"),
        engagement_score: score,
        created_at: Utc::now() - Duration::hours(age_hours),
        body: None,
        comments: vec![],
    }
}

#[test]
fn engagement_filter_is_order_preserving_subset() {
    let mut rng = rand::rng();
    let items: Vec<CandidateItem> = (0..200)
        .map(|i| item(i, rng.random_range(-10..50), 1))
        .collect();
    let min = 5;
    let kept = filter_by_engagement(&items, min);

    assert!(kept.iter().all(|it| it.engagement_score >= min));
    let expected: Vec<&str> = items
        .iter()
        .filter(|it| it.engagement_score >= min)
        .map(|it| it.id.as_str())
        .collect();
    let got: Vec<&str> = kept.iter().map(|it| it.id.as_str()).collect();
    assert_eq!(got, expected);
}

#[test]
fn engagement_filter_is_idempotent() {
    let items: Vec<CandidateItem> = [1, 5, 9, 4, 5, 100]
        .iter()
        .enumerate()
        .map(|(i, s)| item(i, *s, 1))
        .collect();
    let once = filter_by_engagement(&items, 5);
    let twice = filter_by_engagement(&once, 5);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 4);
}

#[test]
fn empty_input_gives_empty_output() {
    assert!(filter_by_engagement(&[], 0).is_empty());
    assert!(prefilter(&[], TimeframeBucket::PastThreeDays, 0, Utc::now()).is_empty());
}

#[test]
fn prefilter_applies_timeframe_and_engagement_together() {
    let now = Utc::now();
    let items = vec![
        item(0, 10, 2),       // fresh and popular
        item(1, 1, 2),        // fresh, too few votes
        item(2, 10, 24 * 5),  // popular, wrong window
        item(3, 6, 24 * 2),   // fresh and popular
    ];
    let kept = prefilter(&items, TimeframeBucket::PastThreeDays, 5, now);
    let ids: Vec<&str> = kept.iter().map(|it| it.id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p3"]);

    let older = prefilter(&items, TimeframeBucket::ThreeDaysToWeek, 5, now);
    assert_eq!(older.len(), 1);
    assert_eq!(older[0].id, "p2");
}
