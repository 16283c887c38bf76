// src/ingest/providers/fixture.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::ingest::types::{CandidateItem, SourceAdapter};
use crate::model::Query;

/// In-memory source for demos and tests. Returns its items (capped) or a fixed failure.
pub struct StaticSource {
    items: Vec<CandidateItem>,
    failure: Option<String>,
}

impl StaticSource {
    pub fn new(items: Vec<CandidateItem>) -> Self {
        Self {
            items,
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    async fn fetch_items(&self, _query: &Query, max_items: usize) -> Result<Vec<CandidateItem>> {
        if let Some(msg) = &self.failure {
            return Err(anyhow!("{msg}"));
        }
        Ok(self.items.iter().take(max_items).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
