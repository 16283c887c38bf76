// src/ingest/providers/link_page.rs
//! News-page link adapter: every `<a href>` on each start page becomes a candidate whose
//! title is the anchor's combined inner text.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::ingest::normalize_text;
use crate::ingest::providers::{http_client, USER_AGENT};
use crate::ingest::types::{CandidateItem, SourceAdapter};
use crate::model::Query;

static RE_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("anchor regex"));
static RE_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("href regex")
});

/// Pull anchors out of `html`. Ids are `p{page_idx}a{n}`, unique across all pages of one
/// fetch. Anchors with no visible text are kept; the scorer skips them.
pub fn extract_links(
    page_url: &Url,
    html: &str,
    page_idx: usize,
    fetched_at: DateTime<Utc>,
) -> Vec<CandidateItem> {
    let mut out = Vec::new();
    for (n, caps) in RE_ANCHOR.captures_iter(html).enumerate() {
        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let inner = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let href = RE_HREF
            .captures(attrs)
            .and_then(|h| h.get(1).or_else(|| h.get(2)).or_else(|| h.get(3)))
            .map(|m| html_escape::decode_html_entities(m.as_str().trim()).to_string())
            .unwrap_or_default();
        let url = page_url
            .join(&href)
            .map(|u| u.to_string())
            .unwrap_or(href);

        out.push(CandidateItem {
            id: format!("p{page_idx}a{n}"),
            source: page_url.to_string(),
            title: normalize_text(inner),
            url,
            engagement_score: 0,
            created_at: fetched_at,
            body: None,
            comments: Vec::new(),
        });
    }
    out
}

pub struct LinkPageSource {
    http: reqwest::Client,
    start_urls: Vec<Url>,
}

impl LinkPageSource {
    pub fn new(start_urls: &[String]) -> Result<Self> {
        let start_urls = start_urls
            .iter()
            .map(|u| Url::parse(u.trim()).with_context(|| format!("invalid start url `{u}`")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            http: http_client(USER_AGENT).context("building link page http client")?,
            start_urls,
        })
    }

    /// `Ok(None)` when the page refused access (401/403).
    async fn fetch_page(&self, url: &Url) -> Result<Option<String>> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            warn!(target: "funnel::ingest", %url, %status, "access denied");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!("{url} returned {status}"));
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl SourceAdapter for LinkPageSource {
    async fn fetch_items(&self, query: &Query, max_items: usize) -> Result<Vec<CandidateItem>> {
        let mut out = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        for (idx, page) in self.start_urls.iter().enumerate() {
            if out.len() >= max_items {
                break;
            }
            info!(target: "funnel::ingest", url = %page, topic = %query.topic, "scraping page");
            match self.fetch_page(page).await {
                Ok(Some(html)) => {
                    let links = extract_links(page, &html, idx, Utc::now());
                    let room = max_items - out.len();
                    out.extend(links.into_iter().take(room));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "funnel::ingest", url = %page, error = %format!("{e:#}"), "page fetch failed");
                    failures.push(format!("{e:#}"));
                }
            }
        }

        if !self.start_urls.is_empty() && failures.len() == self.start_urls.len() {
            return Err(anyhow!(
                "every start page failed: {}",
                failures.join("; ")
            ));
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "link_page"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_become_items_with_absolute_urls() {
        let page = Url::parse("https://news.example.test/business/").unwrap();
        let html = r#"
            <nav><a href="/">Home</a></nav>
            <a class="x" href='/2024/ecommerce-growth'><span>E-commerce</span> <b>growth</b>&nbsp;slows</a>
            <a href=https://other.test/a?x=1&amp;y=2>Other</a>
            <a href="/empty"><img src="i.png"></a>
        "#;
        let now = Utc::now();
        let items = extract_links(&page, html, 3, now);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].id, "p3a0");
        assert_eq!(items[0].url, "https://news.example.test/");
        assert_eq!(items[1].title, "E-commerce growth slows");
        assert_eq!(
            items[1].url,
            "https://news.example.test/2024/ecommerce-growth"
        );
        assert_eq!(items[2].url, "https://other.test/a?x=1&y=2");
        assert_eq!(items[3].title, "");
        assert!(items.iter().all(|i| i.source == page.as_str()));
    }

    #[test]
    fn invalid_start_url_is_rejected() {
        assert!(LinkPageSource::new(&["not a url".to_string()]).is_err());
    }
}
