// src/ingest/providers/mod.rs
pub mod fixture;
pub mod link_page;
pub mod reddit;

use std::time::Duration;

pub(crate) const USER_AGENT: &str =
    "relevance-funnel/0.1 (+https://github.com/relevance-funnel/relevance-funnel)";

/// Shared HTTP client settings for source adapters. The per-request timeout keeps a
/// single slow page from eating the whole source deadline.
pub(crate) fn http_client(user_agent: &str) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(20))
        .build()?;
    Ok(client)
}
