// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod filter;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod relevance;
pub mod timeframe;

// Source adapters (Reddit listings, news link pages, static fixtures)
pub mod ingest;

// Oracle-backed two-stage narrowing
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::config::FunnelConfig;
pub use crate::error::{ErrorKind, FunnelError};
pub use crate::ingest::types::{CandidateItem, SourceAdapter};
pub use crate::model::{AnalysisResult, EmptyStage, Query, ResultSummary, RunOutcome, ScoredItem};
pub use crate::pipeline::Pipeline;
pub use crate::timeframe::TimeframeBucket;
