// src/ingest/providers/reddit.rs
//! Subreddit listing adapter over Reddit's public JSON endpoints.
//!
//! `/r/{name}/new.json` is paged 100 at a time with the `after` cursor. Comment threads
//! are loaded per item through `fetch_comments`, which the pipeline calls only for
//! items that survived relevance scoring.
//!
//! With app credentials the adapter uses the client-credentials grant and talks to
//! `oauth.reddit.com`; without them it falls back to the anonymous `www.reddit.com`
//! endpoints, which are rate limited much harder.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::ingest::normalize_text;
use crate::ingest::providers::{http_client, USER_AGENT};
use crate::ingest::types::{CandidateItem, SourceAdapter};
use crate::model::Query;

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
/// Refresh this long before the server-side expiry.
const TOKEN_SLACK_SECS: u64 = 60;
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    selftext: String,
}

fn unix_to_utc(secs: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .unwrap_or_default()
}

fn post_to_item(subreddit: &str, p: Post) -> CandidateItem {
    let body = normalize_text(&p.selftext);
    CandidateItem {
        id: p.id,
        source: format!("r/{subreddit}"),
        title: normalize_text(&p.title),
        url: p.url,
        engagement_score: p.score,
        created_at: unix_to_utc(p.created_utc),
        body: (!body.is_empty()).then_some(body),
        comments: Vec::new(),
    }
}

/// Flatten a `/comments/{id}.json` response into comment bodies, breadth-first, in
/// the order Reddit returned them. "more" stubs carry no body and are skipped.
pub fn flatten_comments(thread: &Value, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut queue: VecDeque<&Value> = VecDeque::new();
    if let Some(children) = thread
        .get(1)
        .and_then(|l| l.pointer("/data/children"))
        .and_then(Value::as_array)
    {
        queue.extend(children.iter());
    }
    while let Some(node) = queue.pop_front() {
        if out.len() >= limit {
            break;
        }
        if node.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = node.get("data") else {
            continue;
        };
        if let Some(body) = data.get("body").and_then(Value::as_str) {
            let body = body.trim();
            if !body.is_empty() {
                out.push(body.to_string());
            }
        }
        if let Some(replies) = data
            .pointer("/replies/data/children")
            .and_then(Value::as_array)
        {
            queue.extend(replies.iter());
        }
    }
    out
}

struct Credentials {
    client_id: String,
    client_secret: String,
    token_url: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub struct RedditSource {
    http: reqwest::Client,
    base_url: String,
    subreddit: Option<String>,
    comment_limit: usize,
    credentials: Option<Credentials>,
    token: Mutex<Option<AccessToken>>,
}

impl RedditSource {
    /// `subreddit = None` reads the subreddit named like the query topic.
    pub fn new(subreddit: Option<String>, comment_limit: usize) -> Result<Self> {
        Self::with_user_agent(subreddit, comment_limit, USER_AGENT)
    }

    pub fn with_user_agent(
        subreddit: Option<String>,
        comment_limit: usize,
        user_agent: &str,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(user_agent).context("building reddit http client")?,
            base_url: DEFAULT_BASE_URL.to_string(),
            subreddit: subreddit.map(|s| s.trim().trim_start_matches("r/").to_string()),
            comment_limit,
            credentials: None,
            token: Mutex::new(None),
        })
    }

    /// Authenticate as a script app (client-credentials grant) and read from the
    /// OAuth host.
    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.base_url = OAUTH_BASE_URL.to_string();
        self.credentials = Some(Credentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: TOKEN_URL.to_string(),
        });
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the token endpoint. No effect without credentials.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        if let Some(c) = self.credentials.as_mut() {
            c.token_url = token_url.into();
        }
        self
    }

    /// Cached bearer token, fetched on first use and refreshed before expiry.
    async fn bearer(&self) -> Result<Option<String>> {
        let Some(creds) = &self.credentials else {
            return Ok(None);
        };
        let mut cached = self.token.lock().await;
        if let Some(t) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(Some(t.value.clone()));
        }

        let resp = self
            .http
            .post(&creds.token_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("requesting reddit access token")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("reddit token endpoint returned {status}");
        }
        let body: TokenResponse = resp
            .json()
            .await
            .context("decoding reddit access token")?;
        let ttl = body
            .expires_in
            .unwrap_or(3600)
            .saturating_sub(TOKEN_SLACK_SECS)
            .max(1);
        info!(target: "funnel::ingest", ttl_secs = ttl, "reddit access token acquired");
        *cached = Some(AccessToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        Ok(Some(body.access_token))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut req = self.http.get(url);
        if let Some(token) = self.bearer().await? {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            bail!("reddit refused access ({status}) for {url}");
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            bail!("reddit rate limit hit ({status}) for {url}");
        }
        if !status.is_success() {
            bail!("reddit returned {status} for {url}");
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decoding JSON from {url}"))
    }
}

#[async_trait]
impl SourceAdapter for RedditSource {
    async fn fetch_items(&self, query: &Query, max_items: usize) -> Result<Vec<CandidateItem>> {
        let subreddit = self
            .subreddit
            .clone()
            .unwrap_or_else(|| query.topic.replace(' ', ""));

        let mut posts = Vec::new();
        let mut after: Option<String> = None;
        while posts.len() < max_items {
            let limit = PAGE_SIZE.min(max_items - posts.len());
            let mut url = format!(
                "{}/r/{subreddit}/new.json?limit={limit}&raw_json=1",
                self.base_url
            );
            if let Some(cursor) = &after {
                url.push_str(&format!("&after={cursor}"));
            }
            let listing: Listing = self
                .get_json(&url)
                .await
                .with_context(|| format!("listing r/{subreddit}"))?;
            let page_len = listing.data.children.len();
            posts.extend(listing.data.children.into_iter().map(|c| c.data));
            after = listing.data.after;
            if page_len == 0 || after.is_none() {
                break;
            }
        }
        posts.truncate(max_items);

        let out: Vec<CandidateItem> = posts
            .into_iter()
            .map(|p| post_to_item(&subreddit, p))
            .collect();
        debug!(target: "funnel::ingest", subreddit = %subreddit, items = out.len(), "reddit listing loaded");
        Ok(out)
    }

    async fn fetch_comments(&self, item: &CandidateItem) -> Result<Vec<String>> {
        if self.comment_limit == 0 {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/comments/{}.json?raw_json=1&limit={}",
            self.base_url, item.id, self.comment_limit
        );
        let thread: Value = self.get_json(&url).await?;
        Ok(flatten_comments(&thread, self.comment_limit))
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}
