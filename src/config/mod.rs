// src/config/mod.rs
//! Funnel configuration: TOML file + environment overrides.
//!
//! Lookup order:
//! 1) $FUNNEL_CONFIG_PATH (must exist)
//! 2) config/funnel.toml
//! 3) built-in defaults

pub mod oracle;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::relevance::MetricKind;
use crate::timeframe::TimeframeBucket;

pub use oracle::OracleConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/funnel.toml";
pub const ENV_CONFIG_PATH: &str = "FUNNEL_CONFIG_PATH";
pub const ENV_SIMILARITY_THRESHOLD: &str = "FUNNEL_SIMILARITY_THRESHOLD";
pub const ENV_MIN_ENGAGEMENT: &str = "FUNNEL_MIN_ENGAGEMENT";
pub const ENV_ORACLE_PROVIDER: &str = "FUNNEL_ORACLE_PROVIDER";
pub const ENV_REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_REDDIT_USER_AGENT: &str = "REDDIT_USER_AGENT";

/* ----------------------------
Defaults
---------------------------- */

fn default_min_engagement() -> i64 {
    5
}
fn default_max_items() -> usize {
    200
}
fn default_initial_good_post_limit() -> usize {
    20
}
fn default_top_posts_for_analysis() -> usize {
    10
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_timeframe() -> u8 {
    1
}
fn default_source_timeout_secs() -> u64 {
    60
}
fn default_oracle_timeout_secs() -> u64 {
    120
}
fn default_history_path() -> PathBuf {
    PathBuf::from("data/history.jsonl")
}
fn default_comment_limit() -> usize {
    50
}
fn default_env_marker() -> String {
    "ENV".to_string()
}

/* ----------------------------
Schema
---------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_min_engagement")]
    pub min_engagement: i64,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_initial_good_post_limit")]
    pub initial_good_post_limit: usize,
    #[serde(default = "default_top_posts_for_analysis")]
    pub top_posts_for_analysis: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// 1-based bucket selector; unknown values fall back to 1.
    #[serde(default = "default_timeframe")]
    pub timeframe: u8,
    #[serde(default)]
    pub metric: MetricKind,
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_engagement: default_min_engagement(),
            max_items: default_max_items(),
            initial_good_post_limit: default_initial_good_post_limit(),
            top_posts_for_analysis: default_top_posts_for_analysis(),
            similarity_threshold: default_similarity_threshold(),
            timeframe: default_timeframe(),
            metric: MetricKind::default(),
            source_timeout_secs: default_source_timeout_secs(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn timeframe_bucket(&self) -> TimeframeBucket {
        TimeframeBucket::from_selector(self.timeframe)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    fn sanitize(&mut self) {
        if !self.similarity_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.similarity_threshold)
        {
            self.similarity_threshold = default_similarity_threshold();
        }
        if self.max_items == 0 {
            self.max_items = default_max_items();
        }
        if self.initial_good_post_limit == 0 {
            self.initial_good_post_limit = default_initial_good_post_limit();
        }
        if self.top_posts_for_analysis == 0 {
            self.top_posts_for_analysis = default_top_posts_for_analysis();
        }
        if self.source_timeout_secs == 0 {
            self.source_timeout_secs = default_source_timeout_secs();
        }
        if self.oracle_timeout_secs == 0 {
            self.oracle_timeout_secs = default_oracle_timeout_secs();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    /// Subreddit to read; when absent the query topic names the subreddit.
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_comment_limit")]
    pub comment_limit: usize,
    /// "ENV" means: read from REDDIT_CLIENT_ID
    #[serde(default = "default_env_marker")]
    pub client_id: String,
    /// "ENV" means: read from REDDIT_CLIENT_SECRET
    #[serde(default = "default_env_marker")]
    pub client_secret: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            subreddit: None,
            user_agent: None,
            comment_limit: default_comment_limit(),
            client_id: default_env_marker(),
            client_secret: default_env_marker(),
        }
    }
}

fn resolve_env_marker(value: &str, env_key: &str) -> Option<String> {
    let v = if value.trim().eq_ignore_ascii_case("env") {
        std::env::var(env_key).ok()?
    } else {
        value.to_string()
    };
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

impl RedditConfig {
    /// App credentials, or `None` to use the anonymous endpoints.
    pub fn resolve_credentials(&self) -> Option<(String, String)> {
        let id = resolve_env_marker(&self.client_id, ENV_REDDIT_CLIENT_ID)?;
        let secret = resolve_env_marker(&self.client_secret, ENV_REDDIT_CLIENT_SECRET)?;
        Some((id, secret))
    }

    /// Configured user agent, else $REDDIT_USER_AGENT.
    pub fn resolve_user_agent(&self) -> Option<String> {
        self.user_agent
            .clone()
            .filter(|ua| !ua.trim().is_empty())
            .or_else(|| resolve_env_marker("ENV", ENV_REDDIT_USER_AGENT))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinksConfig {
    #[serde(default)]
    pub start_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunnelConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

/* ----------------------------
Loading
---------------------------- */

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

impl FunnelConfig {
    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: FunnelConfig = toml::from_str(s).context("parsing funnel config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading funnel config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// `load_from` plus env overrides, sanitized again afterwards.
    pub fn load_from_with_env(path: &Path) -> Result<Self> {
        let mut cfg = Self::load_from(path)?;
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_with_env(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_with_env(&default_path);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = parse_threshold_env(std::env::var(ENV_SIMILARITY_THRESHOLD).ok()) {
            self.pipeline.similarity_threshold = t;
        }
        if let Some(n) = std::env::var(ENV_MIN_ENGAGEMENT)
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            self.pipeline.min_engagement = n;
        }
        if let Ok(p) = std::env::var(ENV_ORACLE_PROVIDER) {
            if !p.trim().is_empty() {
                self.oracle.provider = p;
            }
        }
    }

    fn sanitize(&mut self) {
        self.pipeline.sanitize();
        self.oracle.sanitize();
    }
}
