//! history.rs: append-only, topic-keyed log of finished runs.
//!
//! The store sits on a key-less line log (`HistoryLog`). Records come back in write
//! order; repeated topics append new entries instead of replacing old ones.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::FunnelError;
use crate::model::ResultSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub topic: String,
    pub results: Vec<ResultSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Durable key-less append log, readable back in write order.
pub trait HistoryLog: Send + Sync {
    /// Must be durable before returning.
    fn append_line(&self, line: &str) -> Result<()>;
    /// Every line in write order. Missing storage reads as empty.
    fn read_lines(&self) -> Result<Vec<String>>;
}

/// One JSON document per line.
pub struct JsonlFileLog {
    path: PathBuf,
}

impl JsonlFileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cut an unterminated last line (a write interrupted before its newline) back to
    /// the previous line boundary. That record was never acknowledged.
    fn repair_torn_tail(&self) -> Result<()> {
        let mut f = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("opening {}", self.path.display())),
        };
        let len = f.metadata()?.len();
        if len == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        f.seek(SeekFrom::End(-1))?;
        f.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let bytes = fs::read(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let keep = bytes
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        warn!(
            target: "funnel::history",
            path = %self.path.display(),
            dropped_bytes = bytes.len() - keep,
            "truncating unterminated history line"
        );
        let f = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        f.set_len(keep as u64)
            .with_context(|| format!("truncating {}", self.path.display()))?;
        f.sync_all()
            .with_context(|| format!("syncing {}", self.path.display()))?;
        Ok(())
    }
}

impl HistoryLog for JsonlFileLog {
    fn append_line(&self, line: &str) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating history dir {}", dir.display()))?;
        }
        self.repair_torn_tail()?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        f.write_all(buf.as_bytes())
            .with_context(|| format!("writing {}", self.path.display()))?;
        f.sync_all()
            .with_context(|| format!("syncing {}", self.path.display()))?;
        Ok(())
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(s.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}

/// Process-local log for tests and dry runs.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl HistoryLog for MemoryLog {
    fn append_line(&self, line: &str) -> Result<()> {
        self.lines
            .lock()
            .map_err(|_| anyhow!("history log mutex poisoned"))?
            .push(line.to_string());
        Ok(())
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        Ok(self
            .lines
            .lock()
            .map_err(|_| anyhow!("history log mutex poisoned"))?
            .clone())
    }
}

pub struct HistoryStore {
    log: Box<dyn HistoryLog>,
}

impl HistoryStore {
    pub fn new(log: Box<dyn HistoryLog>) -> Self {
        Self { log }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(JsonlFileLog::new(path)))
    }

    pub fn in_memory() -> Self {
        Self::new(Box::<MemoryLog>::default())
    }

    /// Durably record a finished run and return the stored entry.
    pub fn append(
        &self,
        topic: &str,
        results: Vec<ResultSummary>,
        narrative: Option<String>,
    ) -> Result<HistoryEntry, FunnelError> {
        let entry = HistoryEntry {
            topic: topic.to_string(),
            results,
            narrative,
            recorded_at: Utc::now(),
        };
        let line = serde_json::to_string(&entry)
            .context("serializing history entry")
            .map_err(FunnelError::persistence)?;
        self.log
            .append_line(&line)
            .context("appending history entry")
            .map_err(FunnelError::persistence)?;
        info!(target: "funnel::history", topic, results = entry.results.len(), "history entry appended");
        Ok(entry)
    }

    /// All entries in write order. Blank lines are ignored. An unparsable last line is a
    /// torn write and is skipped with a warning; a malformed line anywhere else fails the read.
    pub fn load_all(&self) -> Result<Vec<HistoryEntry>, FunnelError> {
        let lines = self.log.read_lines().map_err(FunnelError::persistence)?;
        let last = lines.iter().rposition(|l| !l.trim().is_empty());
        let mut out = Vec::with_capacity(lines.len());
        for (n, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => out.push(entry),
                Err(e) if Some(n) == last => {
                    warn!(target: "funnel::history", line = n + 1, error = %e, "skipping torn last history line");
                }
                Err(e) => {
                    return Err(FunnelError::persistence(
                        anyhow::Error::new(e)
                            .context(format!("history line {} is malformed", n + 1)),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// First entry whose topic matches exactly (case-sensitive).
    pub fn find_by_topic(&self, topic: &str) -> Result<Option<HistoryEntry>, FunnelError> {
        Ok(self.load_all()?.into_iter().find(|e| e.topic == topic))
    }

    /// Distinct topics in first-seen order.
    pub fn topics(&self) -> Result<Vec<String>, FunnelError> {
        let mut out: Vec<String> = Vec::new();
        for e in self.load_all()? {
            if !out.contains(&e.topic) {
                out.push(e.topic);
            }
        }
        Ok(out)
    }
}
