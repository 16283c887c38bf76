//! timeframe.rs: half-open age windows used to restrict items by recency.
//!
//! The table is static: `(min_days, max_days)` pairs converted to seconds. An item
//! of age `a` belongs to a bucket iff `min_secs <= a < max_secs`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECS_PER_DAY: i64 = 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeBucket {
    #[default]
    PastThreeDays,
    ThreeDaysToWeek,
    WeekToTwoWeeks,
    TwoToThreeWeeks,
}

struct BucketSpec {
    bucket: TimeframeBucket,
    label: &'static str,
    min_days: i64,
    max_days: i64,
}

static BUCKETS: [BucketSpec; 4] = [
    BucketSpec {
        bucket: TimeframeBucket::PastThreeDays,
        label: "Past 3 days",
        min_days: 0,
        max_days: 3,
    },
    BucketSpec {
        bucket: TimeframeBucket::ThreeDaysToWeek,
        label: "3 days to 1 week",
        min_days: 3,
        max_days: 7,
    },
    BucketSpec {
        bucket: TimeframeBucket::WeekToTwoWeeks,
        label: "1 week to 2 weeks",
        min_days: 7,
        max_days: 14,
    },
    BucketSpec {
        bucket: TimeframeBucket::TwoToThreeWeeks,
        label: "2 weeks to 3 weeks",
        min_days: 14,
        max_days: 21,
    },
];

impl TimeframeBucket {
    pub const ALL: [TimeframeBucket; 4] = [
        TimeframeBucket::PastThreeDays,
        TimeframeBucket::ThreeDaysToWeek,
        TimeframeBucket::WeekToTwoWeeks,
        TimeframeBucket::TwoToThreeWeeks,
    ];

    fn spec(self) -> &'static BucketSpec {
        &BUCKETS[self.selector() as usize - 1]
    }

    /// Map a 1-based selector to a bucket. Unknown selectors fall back to the first
    /// bucket; this is lenient on purpose and never an error.
    pub fn from_selector(selector: u8) -> Self {
        match selector {
            1 => TimeframeBucket::PastThreeDays,
            2 => TimeframeBucket::ThreeDaysToWeek,
            3 => TimeframeBucket::WeekToTwoWeeks,
            4 => TimeframeBucket::TwoToThreeWeeks,
            other => {
                tracing::debug!(selector = other, "unknown timeframe selector, using bucket 1");
                TimeframeBucket::PastThreeDays
            }
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            TimeframeBucket::PastThreeDays => 1,
            TimeframeBucket::ThreeDaysToWeek => 2,
            TimeframeBucket::WeekToTwoWeeks => 3,
            TimeframeBucket::TwoToThreeWeeks => 4,
        }
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn min_secs(self) -> i64 {
        self.spec().min_days * SECS_PER_DAY
    }

    pub fn max_secs(self) -> i64 {
        self.spec().max_days * SECS_PER_DAY
    }

    /// True iff `min_secs <= age_secs < max_secs`.
    pub fn contains_age(self, age_secs: i64) -> bool {
        self.min_secs() <= age_secs && age_secs < self.max_secs()
    }
}

impl fmt::Display for TimeframeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the selector ("1".."4") or the label (case-insensitive).
/// Anything else falls back to the first bucket, same as `from_selector`.
impl FromStr for TimeframeBucket {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Ok(Self::from_selector(n));
        }
        Ok(BUCKETS
            .iter()
            .find(|b| b.label.eq_ignore_ascii_case(s))
            .map(|b| b.bucket)
            .unwrap_or_else(|| Self::from_selector(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_half_open() {
        let b = TimeframeBucket::ThreeDaysToWeek;
        assert!(!b.contains_age(3 * SECS_PER_DAY - 1));
        assert!(b.contains_age(3 * SECS_PER_DAY));
        assert!(b.contains_age(7 * SECS_PER_DAY - 1));
        assert!(!b.contains_age(7 * SECS_PER_DAY));
    }

    #[test]
    fn unknown_selector_falls_back_to_first() {
        assert_eq!(TimeframeBucket::from_selector(0), TimeframeBucket::PastThreeDays);
        assert_eq!(TimeframeBucket::from_selector(9), TimeframeBucket::PastThreeDays);
        assert_eq!(
            "nonsense".parse::<TimeframeBucket>().unwrap(),
            TimeframeBucket::PastThreeDays
        );
    }

    #[test]
    fn parses_selector_and_label() {
        assert_eq!(
            "3".parse::<TimeframeBucket>().unwrap(),
            TimeframeBucket::WeekToTwoWeeks
        );
        assert_eq!(
            "2 WEEKS TO 3 WEEKS".parse::<TimeframeBucket>().unwrap(),
            TimeframeBucket::TwoToThreeWeeks
        );
    }

    #[test]
    fn future_items_match_no_bucket() {
        for b in TimeframeBucket::ALL {
            assert!(!b.contains_age(-1));
        }
    }
}
