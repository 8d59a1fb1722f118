// RSS/Atom feeds. Feeds are fetched one after another; a broken feed only
// costs its own items.

use anyhow::{Context, Result};
use async_trait::async_trait;
use feed_rs::model::Feed;
use sniper_common::{RawItem, SourceKind};

use super::{http_client, merge_targets, strip_tags, SourceAdapter, SourceOutcome, SOURCE_TIMEOUT};
use crate::retry::{with_retries, RetryPolicy};

pub struct RssSource {
    client: reqwest::Client,
    feeds: Vec<String>,
    max_items: usize,
    retry: RetryPolicy,
}

impl RssSource {
    pub fn new(feeds: Vec<String>, max_items: usize, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: http_client(SOURCE_TIMEOUT)?,
            feeds,
            max_items,
            retry,
        })
    }

    async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<RawItem>> {
        let feed = with_retries(feed_url, self.retry, move || async move {
            let bytes = self
                .client
                .get(feed_url)
                .send()
                .await
                .context("RSS feed fetch failed")?
                .error_for_status()
                .context("RSS feed returned error status")?
                .bytes()
                .await
                .context("Failed to read RSS feed body")?;
            parse_feed(&bytes)
        })
        .await?;

        Ok(feed_items(feed, self.max_items))
    }

    async fn fetch_all(&self) -> Result<Vec<RawItem>> {
        let mut results = Vec::with_capacity(self.feeds.len());
        for feed_url in &self.feeds {
            let result = self.fetch_feed(feed_url).await;
            results.push((feed_url.clone(), result));
        }
        merge_targets(self.name(), results)
    }
}

/// Parses without feed-rs' id fallback, which invents a random UUID for
/// entries with neither guid nor link. Those resolve to a stable synthetic id.
fn parse_feed(bytes: &[u8]) -> Result<Feed> {
    feed_rs::parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build()
        .parse(bytes)
        .context("Failed to parse RSS/Atom feed")
}

/// First `max_items` entries of a parsed feed, in feed order.
fn feed_items(feed: Feed, max_items: usize) -> Vec<RawItem> {
    feed.entries
        .into_iter()
        .take(max_items)
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let id = if entry.id.is_empty() {
                Some(link.clone())
            } else {
                Some(entry.id)
            };
            let body = entry
                .summary
                .map(|t| t.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            RawItem::new(
                SourceKind::Rss,
                id,
                entry.title.map(|t| t.content).unwrap_or_default(),
                link,
                strip_tags(&body).trim(),
            )
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for RssSource {
    fn name(&self) -> &str {
        "rss"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    async fn fetch(&self) -> SourceOutcome {
        SourceOutcome::from_result(self.name(), self.fetch_all().await)
    }
}
