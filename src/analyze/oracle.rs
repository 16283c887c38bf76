//! Oracle adapter: the external LLM used for coarse selection and deep analysis.
//! One trait, one swappable model identifier per stage, no response caching.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::OracleConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Request/response text oracle. Each call is independent; implementations may be
/// non-deterministic.
pub trait Oracle: Send + Sync {
    /// Coarse stage: return a delimited list of item ids.
    fn classify<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a>;
    /// Deep stage: return free-text analysis.
    fn analyze<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynOracle = Arc<dyn Oracle>;

/// Factory: build an oracle according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns the deterministic mock.
/// * Else `provider = "mock"` also returns the mock.
/// * Else `provider = "openai"` builds the Chat Completions client.
pub fn build_oracle(config: &OracleConfig) -> Result<DynOracle> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockOracle::default()));
    }

    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockOracle::default())),
        "openai" => {
            let api_key = config.resolve_api_key()?;
            Ok(Arc::new(OpenAiOracle::new(api_key, config)?))
        }
        other => bail!("Unsupported oracle provider: {other}"),
    }
}

// ------------------------------------------------------------
// OpenAI
// ------------------------------------------------------------

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// OpenAI provider (Chat Completions API).
pub struct OpenAiOracle {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    classify_model: String,
    analyze_model: String,
    temperature: f32,
    classify_max_tokens: u32,
    analyze_max_tokens: u32,
}

impl OpenAiOracle {
    pub fn new(api_key: String, config: &OracleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("relevance-funnel/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(180))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key,
            endpoint: OPENAI_CHAT_URL.to_string(),
            classify_model: config.classify_model.clone(),
            analyze_model: config.analyze_model.clone(),
            temperature: config.temperature,
            classify_max_tokens: config.classify_max_tokens,
            analyze_max_tokens: config.analyze_max_tokens,
        })
    }

    /// Point at an OpenAI-compatible endpoint (proxy, local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn chat(&self, model: &str, max_tokens: u32, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("OpenAI API key is empty");
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("calling {model}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            bail!("{model} returned {status}: {snippet}");
        }
        let body: Resp = resp
            .json()
            .await
            .with_context(|| format!("decoding {model} response"))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| anyhow!("{model} returned no choices"))
    }
}

impl Oracle for OpenAiOracle {
    fn classify<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(self.chat(&self.classify_model, self.classify_max_tokens, prompt))
    }

    fn analyze<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(self.chat(&self.analyze_model, self.analyze_max_tokens, prompt))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Mock
// ------------------------------------------------------------

/// Deterministic oracle for local runs and tests.
/// `classify` echoes the first `pick` post ids found in the prompt; `analyze` reports
/// how many posts it was shown.
#[derive(Clone)]
pub struct MockOracle {
    pub pick: usize,
}

impl Default for MockOracle {
    fn default() -> Self {
        Self { pick: 20 }
    }
}

fn prompt_post_ids(prompt: &str) -> Vec<&str> {
    prompt
        .lines()
        .filter_map(|l| l.strip_prefix(crate::analyze::prompt::POST_ID_PREFIX))
        .map(str::trim)
        .collect()
}

impl Oracle for MockOracle {
    fn classify<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        let ids: Vec<&str> = prompt_post_ids(prompt).into_iter().take(self.pick).collect();
        let out = ids.join(", ");
        Box::pin(async move { Ok(out) })
    }

    fn analyze<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        let n = prompt_post_ids(prompt).len();
        Box::pin(async move { Ok(format!("Mock analysis of {n} posts: no real insights.")) })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
