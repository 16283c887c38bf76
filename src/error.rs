// src/error.rs
use thiserror::Error;

use crate::model::AnalysisResult;

/// Error kind a front-end can branch on when rendering a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Source,
    Oracle,
    Persistence,
}

#[derive(Debug, Error)]
pub enum FunnelError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    /// History read/write failed. When a run had already produced its analysis,
    /// the result rides along so the caller can still show it.
    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        result: Option<Box<AnalysisResult>>,
    },
}

impl FunnelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FunnelError::Validation(_) => ErrorKind::Validation,
            FunnelError::Source(_) => ErrorKind::Source,
            FunnelError::Oracle(_) => ErrorKind::Oracle,
            FunnelError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    pub fn source_failure(err: anyhow::Error) -> Self {
        FunnelError::Source(format!("{err:#}"))
    }

    pub fn oracle_failure(err: anyhow::Error) -> Self {
        FunnelError::Oracle(format!("{err:#}"))
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        FunnelError::Persistence {
            message: format!("{err:#}"),
            result: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FunnelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn cause_chain_is_kept_in_message() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("429 Too Many Requests"));
        let err = FunnelError::source_failure(inner.context("fetching r/rust").unwrap_err());
        assert_eq!(err.kind(), ErrorKind::Source);
        let msg = err.to_string();
        assert!(msg.contains("fetching r/rust"));
        assert!(msg.contains("429"));
    }
}
