// src/pipeline.rs
//! Pipeline orchestrator.
//!
//! Order:
//! 1) validate + normalize query
//! 2) fetch from the source adapter (deadline)
//! 3) timeframe ∧ engagement pre-filter
//! 4) relevance scorer, then comments for the scored items only (same deadline as fetch)
//! 5) COARSE narrowing (empty → "no candidates", not an error)
//! 6) DEEP analysis
//! 7) history append
//!
//! Progress: 0 → 25 → 40 → 55 → 90 → 100. Failures abort the run with the stage's
//! error kind; nothing from a failed run is persisted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use chrono::Utc;
use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::analyze::narrow::Narrower;
use crate::analyze::oracle::DynOracle;
use crate::config::PipelineConfig;
use crate::error::FunnelError;
use crate::filter::prefilter;
use crate::history::HistoryStore;
use crate::ingest::fetch_with_timeout;
use crate::ingest::types::SourceAdapter;
use crate::model::{AnalysisResult, EmptyStage, Query, ResultSummary, RunOutcome, ScoredItem};
use crate::progress::{self, NoopProgress, ProgressSink};
use crate::relevance::{build_metric, RelevanceScorer, SimilarityMetric};

pub struct Pipeline {
    settings: PipelineConfig,
    source: Arc<dyn SourceAdapter>,
    scorer: RelevanceScorer,
    narrower: Narrower,
    history: HistoryStore,
    progress: Arc<dyn ProgressSink>,
    running: AtomicBool,
}

/// Clears the in-flight flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Pipeline {
    pub fn new(
        settings: PipelineConfig,
        source: Arc<dyn SourceAdapter>,
        oracle: DynOracle,
        history: HistoryStore,
    ) -> Self {
        let scorer = RelevanceScorer::new(build_metric(settings.metric));
        let narrower = Narrower::new(
            oracle,
            settings.initial_good_post_limit,
            settings.top_posts_for_analysis,
            settings.oracle_timeout(),
        );
        Self {
            settings,
            source,
            scorer,
            narrower,
            history,
            progress: Arc::new(NoopProgress),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Swap the similarity metric (e.g. an embedding-backed one).
    pub fn with_metric(mut self, metric: Arc<dyn SimilarityMetric>) -> Self {
        self.scorer = RelevanceScorer::new(metric);
        self
    }

    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Build a query for `topic` from the configured defaults.
    pub fn query(&self, topic: &str) -> Result<Query, FunnelError> {
        Query::new(
            topic,
            self.settings.timeframe_bucket(),
            self.settings.min_engagement,
            self.settings.similarity_threshold,
        )
    }

    /// Run on a tokio worker so the caller's thread stays free.
    pub fn spawn(self: Arc<Self>, query: Query) -> JoinHandle<Result<RunOutcome, FunnelError>> {
        tokio::spawn(async move { self.run(&query).await })
    }

    /// One full run. A second run while one is in flight is rejected.
    pub async fn run(&self, query: &Query) -> Result<RunOutcome, FunnelError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FunnelError::Validation(
                "a pipeline run is already in progress".to_string(),
            ));
        }
        let _guard = RunGuard(&self.running);

        let t0 = Instant::now();
        counter!("funnel_runs_total").increment(1);
        progress::report(&*self.progress, 0);

        let res = self.run_stages(query).await;

        histogram!("funnel_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        progress::report(&*self.progress, 100);
        match &res {
            Ok(RunOutcome::Completed(r)) => {
                info!(target: "funnel::pipeline", topic = %r.topic, results = r.results.len(), "run completed")
            }
            Ok(RunOutcome::NoCandidates { stage }) => {
                info!(target: "funnel::pipeline", topic = %query.topic, ?stage, "run ended without candidates")
            }
            Err(e) => {
                error!(target: "funnel::pipeline", topic = %query.topic, kind = ?e.kind(), error = %e, "run failed")
            }
        }
        res
    }

    async fn attach_comments(
        &self,
        mut scored: Vec<ScoredItem>,
    ) -> Result<Vec<ScoredItem>, FunnelError> {
        let source = &*self.source;
        let deadline = self.settings.source_timeout();
        let load = async {
            for s in scored.iter_mut() {
                s.item.comments = source
                    .fetch_comments(&s.item)
                    .await
                    .with_context(|| format!("loading comments for {}", s.item.id))?;
            }
            anyhow::Ok(())
        };
        match tokio::time::timeout(deadline, load).await {
            Ok(res) => res.map_err(FunnelError::source_failure)?,
            Err(_) => {
                return Err(FunnelError::source_failure(anyhow!(
                    "source `{}` timed out loading comments after {}s",
                    source.name(),
                    deadline.as_secs()
                )))
            }
        }
        Ok(scored)
    }

    async fn run_stages(&self, query: &Query) -> Result<RunOutcome, FunnelError> {
        // Fields are public, so a hand-built query gets the same checks and normalization.
        let normalized = Query::new(
            &query.topic,
            query.timeframe,
            query.min_engagement,
            query.similarity_threshold,
        )?;
        let query = &normalized;

        // Ingestion + pre-filter
        let items = fetch_with_timeout(
            &*self.source,
            query,
            self.settings.max_items,
            self.settings.source_timeout(),
        )
        .await
        .map_err(FunnelError::source_failure)?;
        if items.is_empty() {
            return Ok(RunOutcome::NoCandidates {
                stage: EmptyStage::Ingestion,
            });
        }

        let kept = prefilter(&items, query.timeframe, query.min_engagement, Utc::now());
        counter!("funnel_items_prefiltered_total").increment(kept.len() as u64);
        info!(
            target: "funnel::pipeline",
            fetched = items.len(),
            kept = kept.len(),
            timeframe = %query.timeframe,
            min_engagement = query.min_engagement,
            "pre-filter done"
        );
        progress::report(&*self.progress, 25);
        if kept.is_empty() {
            return Ok(RunOutcome::NoCandidates {
                stage: EmptyStage::Prefilter,
            });
        }

        // Relevance
        let scored = self
            .scorer
            .score_items(&query.topic, &kept, query.similarity_threshold);
        progress::report(&*self.progress, 40);
        if scored.is_empty() {
            return Ok(RunOutcome::NoCandidates {
                stage: EmptyStage::Relevance,
            });
        }

        let scored = self.attach_comments(scored).await?;

        // COARSE
        let survivors = self.narrower.coarse(&scored).await?;
        progress::report(&*self.progress, 55);
        if survivors.is_empty() {
            return Ok(RunOutcome::NoCandidates {
                stage: EmptyStage::Coarse,
            });
        }

        // DEEP
        let narrative = self.narrower.deep(&query.topic, &survivors).await?;
        progress::report(&*self.progress, 90);

        let results: Vec<ResultSummary> = self
            .narrower
            .deep_input(&survivors)
            .iter()
            .map(ResultSummary::from)
            .collect();

        let result = AnalysisResult {
            topic: query.topic.clone(),
            results,
            narrative: Some(narrative),
            completed_at: Utc::now(),
        };

        // Persist
        if let Err(e) = self.history.append(
            &result.topic,
            result.results.clone(),
            result.narrative.clone(),
        ) {
            let message = match e {
                FunnelError::Persistence { message, .. } => message,
                other => other.to_string(),
            };
            return Err(FunnelError::Persistence {
                message,
                result: Some(Box::new(result)),
            });
        }

        Ok(RunOutcome::Completed(result))
    }
}
