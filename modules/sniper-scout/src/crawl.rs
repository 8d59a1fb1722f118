// One-hop link crawler. Pages linked from fetched items become `web` items.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use sniper_common::{RawItem, SeenState, SourceKind};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use crate::sources::{http_client, truncate_chars, SOURCE_TIMEOUT};

/// Cap on page text handed to the filter.
pub const MAX_PAGE_CHARS: usize = 20_000;

const CRAWL_CONCURRENCY: usize = 4;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// --- PageFetcher trait ---

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Raw HTML of the page at `url`.
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client(SOURCE_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
        }
        self.client
            .get(parsed)
            .send()
            .await
            .context("Page fetch failed")?
            .error_for_status()
            .context("Page returned error status")?
            .text()
            .await
            .context("Failed to read page body")
    }
}

// --- LinkCrawler ---

pub struct LinkCrawler {
    fetcher: Box<dyn PageFetcher>,
}

impl LinkCrawler {
    pub fn new(fetcher: Box<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Links worth following: http(s) only, first occurrence wins, pages
    /// already processed in an earlier run are skipped, at most `max_links`.
    /// News and feed links go first; they point at articles, while social
    /// links mostly point back at the post itself.
    pub fn candidate_links(items: &[RawItem], seen: &SeenState, max_links: usize) -> Vec<String> {
        let mut ordered: Vec<&RawItem> = items.iter().filter(|item| item.source != SourceKind::Web).collect();
        ordered.sort_by_key(|item| link_priority(item.source));

        let mut unique = HashSet::new();
        ordered
            .into_iter()
            .map(|item| item.link.trim())
            .filter(|link| link.starts_with("http://") || link.starts_with("https://"))
            .filter(|link| !seen.has_post(&web_id(link)))
            .filter(|link| unique.insert(link.to_string()))
            .take(max_links)
            .map(str::to_string)
            .collect()
    }

    /// Fetch each link once. Failed pages are logged and dropped; output
    /// keeps the order of `links`.
    pub async fn crawl(&self, links: &[String]) -> Vec<RawItem> {
        let pages: Vec<Option<RawItem>> = stream::iter(links)
            .map(|link| async move {
                match self.fetcher.fetch_html(link).await {
                    Ok(html) => Some(page_item(link, &html)),
                    Err(e) => {
                        warn!(url = link.as_str(), error = %e, "Crawl failed");
                        None
                    }
                }
            })
            .buffered(CRAWL_CONCURRENCY)
            .collect()
            .await;

        let items: Vec<RawItem> = pages.into_iter().flatten().collect();
        info!(requested = links.len(), crawled = items.len(), "Link crawl complete");
        items
    }
}

fn link_priority(source: SourceKind) -> u8 {
    match source {
        SourceKind::BingNews | SourceKind::Rss => 0,
        _ => 1,
    }
}

fn web_id(link: &str) -> String {
    format!("{}|{}", SourceKind::Web, link)
}

/// Turn a fetched page into a `web` item. The id is left empty so it
/// resolves to `web|<url>` and never collides with the item that linked it.
pub(crate) fn page_item(url: &str, html: &str) -> RawItem {
    let title = TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
        .unwrap_or_default();
    let text = truncate_chars(&collapse_whitespace(&html_to_text(html, url)), MAX_PAGE_CHARS);
    RawItem::new(SourceKind::Web, None, title, url, text)
}

fn html_to_text(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: false,
        main_content: false,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}
