// Source adapters. Each one turns a single origin into RawItems and never
// lets an error escape: failures come back as `SourceOutcome::Failed`.

pub mod bing;
pub mod mastodon;
pub mod reddit;
pub mod rss;
pub mod twitter;

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use sniper_common::{Config, RawItem, SourceKind};
use tracing::{info, warn};

use crate::retry::RetryPolicy;

pub use bing::BingNewsSource;
pub use mastodon::MastodonSource;
pub use reddit::RedditSource;
pub use rss::RssSource;
pub use twitter::TwitterSource;

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; SoraSniper/1.0)";

/// Per-call timeout for source requests.
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// What one adapter produced in one run.
#[derive(Debug)]
pub enum SourceOutcome {
    Fetched(Vec<RawItem>),
    Failed(String),
}

impl SourceOutcome {
    pub fn from_result(source: &str, result: Result<Vec<RawItem>>) -> Self {
        match result {
            Ok(items) => {
                info!(source, items = items.len(), "Source fetched");
                Self::Fetched(items)
            }
            Err(e) => {
                warn!(source, error = %e, "Source failed");
                Self::Failed(format!("{e:#}"))
            }
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> SourceKind;
    /// Fetch everything this origin currently offers. Never fails.
    async fn fetch(&self) -> SourceOutcome;
}

/// Build the enabled adapters in fixed priority order: reddit, twitter,
/// bing, rss, mastodon. Order matters for code dedup tie-breaking.
pub fn adapters_from_config(config: &Config) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let retry = RetryPolicy::new(config.max_retries, config.retry_delay);
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();

    if config.reddit_enabled && !config.subreddits.is_empty() {
        adapters.push(Box::new(RedditSource::new(
            config.subreddits.clone(),
            config.reddit_limit,
            config.reddit_credentials.clone(),
            retry,
        )?));
    }
    if config.use_snscrape {
        adapters.push(Box::new(TwitterSource::new(
            config.keywords.clone(),
            config.twitter_max_results,
        )));
    }
    if let Some(key) = &config.bing_api_key {
        adapters.push(Box::new(BingNewsSource::new(
            key.clone(),
            config.keywords.clone(),
            config.bing_count,
            retry,
        )?));
    }
    if !config.rss_feeds.is_empty() {
        adapters.push(Box::new(RssSource::new(
            config.rss_feeds.clone(),
            config.rss_max_items,
            retry,
        )?));
    }
    if !config.mastodon_instances.is_empty() && !config.mastodon_hashtags.is_empty() {
        adapters.push(Box::new(MastodonSource::new(
            config.mastodon_instances.clone(),
            config.mastodon_hashtags.clone(),
            retry,
        )?));
    }

    let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
    info!(?names, "Source adapters enabled");
    Ok(adapters)
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Merge per-target results of a multi-target adapter (subreddits, feeds,
/// instances). Individual target failures are logged and skipped; the
/// adapter only fails when every target failed.
pub(crate) fn merge_targets(
    source: &str,
    results: Vec<(String, Result<Vec<RawItem>>)>,
) -> Result<Vec<RawItem>> {
    let total = results.len();
    let mut items = Vec::new();
    let mut failures = Vec::new();

    for (target, result) in results {
        match result {
            Ok(mut batch) => {
                info!(source, target = target.as_str(), items = batch.len(), "Target fetched");
                items.append(&mut batch);
            }
            Err(e) => {
                warn!(source, target = target.as_str(), error = %e, "Target failed");
                failures.push(format!("{target}: {e}"));
            }
        }
    }

    if total > 0 && failures.len() == total {
        anyhow::bail!("all targets failed: {}", failures.join("; "));
    }
    Ok(items)
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Remove HTML tags and decode the handful of entities status APIs emit.
pub(crate) fn strip_tags(html: &str) -> String {
    TAG_RE
        .replace_all(html, "")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// First `max` characters of `text`, never splitting a code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> RawItem {
        RawItem::new(SourceKind::Rss, Some(id.into()), "", "", "")
    }

    #[test]
    fn merge_keeps_successful_targets_in_order() {
        let merged = merge_targets(
            "rss",
            vec![
                ("a".into(), Ok(vec![item("1"), item("2")])),
                ("b".into(), Err(anyhow::anyhow!("timeout"))),
                ("c".into(), Ok(vec![item("3")])),
            ],
        )
        .unwrap();
        let ids: Vec<_> = merged.iter().map(|i| i.resolved_id()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn merge_fails_only_when_every_target_failed() {
        let err = merge_targets(
            "rss",
            vec![
                ("a".into(), Err(anyhow::anyhow!("dns"))),
                ("b".into(), Err(anyhow::anyhow!("503"))),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("a: dns"));
        assert!(err.to_string().contains("b: 503"));
    }

    #[test]
    fn merge_of_no_targets_is_empty() {
        assert!(merge_targets("rss", Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn strip_tags_removes_markup_and_entities() {
        assert_eq!(
            strip_tags("<p>Code: <b>AB12C3</b> &amp; more</p>"),
            "Code: AB12C3 & more"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 80), "hi");
    }

    #[test]
    fn failed_outcome_carries_diagnostic() {
        let outcome = SourceOutcome::from_result("bing", Err(anyhow::anyhow!("401")));
        assert!(matches!(outcome, SourceOutcome::Failed(msg) if msg.contains("401")));
    }

    #[test]
    fn default_config_enables_only_reddit() {
        let adapters = adapters_from_config(&Config::default()).unwrap();
        let kinds: Vec<_> = adapters.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![SourceKind::Reddit]);
    }

    #[test]
    fn adapters_follow_priority_order() {
        let config = Config {
            use_snscrape: true,
            bing_api_key: Some("key".into()),
            rss_feeds: vec!["https://example.com/feed".into()],
            mastodon_instances: vec!["mastodon.social".into()],
            ..Config::default()
        };
        let kinds: Vec<_> = adapters_from_config(&config)
            .unwrap()
            .iter()
            .map(|a| a.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Reddit,
                SourceKind::Twitter,
                SourceKind::BingNews,
                SourceKind::Rss,
                SourceKind::Mastodon,
            ]
        );
    }
}
