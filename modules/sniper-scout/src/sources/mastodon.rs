// Mastodon public hashtag timelines, one request per instance and hashtag.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sniper_common::{RawItem, SourceKind};

use super::{
    http_client, merge_targets, strip_tags, truncate_chars, SourceAdapter, SourceOutcome,
    SOURCE_TIMEOUT,
};
use crate::retry::{with_retries, RetryPolicy};

const TIMELINE_LIMIT: &str = "40";
const TITLE_CHARS: usize = 80;

pub struct MastodonSource {
    client: reqwest::Client,
    instances: Vec<String>,
    hashtags: Vec<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    content: String,
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    acct: String,
}

impl MastodonSource {
    pub fn new(instances: Vec<String>, hashtags: Vec<String>, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: http_client(SOURCE_TIMEOUT)?,
            instances,
            hashtags,
            retry,
        })
    }

    async fn fetch_timeline(&self, instance: &str, tag: &str) -> Result<Vec<RawItem>> {
        let url = timeline_url(instance, tag)?;
        let url = &url;
        let label = format!("mastodon-{instance}-{tag}");
        let statuses = with_retries(&label, self.retry, move || async move {
            let resp = self
                .client
                .get(url.clone())
                .query(&[("limit", TIMELINE_LIMIT)])
                .send()
                .await
                .context("Mastodon request failed")?
                .error_for_status()
                .context("Mastodon returned error status")?;
            let statuses: Vec<Status> = resp.json().await.context("Failed to parse Mastodon timeline")?;
            Ok(statuses)
        })
        .await?;

        Ok(status_items(instance, statuses))
    }

    async fn fetch_all(&self) -> Result<Vec<RawItem>> {
        let mut results = Vec::new();
        for instance in &self.instances {
            for tag in &self.hashtags {
                let result = self.fetch_timeline(instance, tag).await;
                results.push((format!("{instance}#{tag}"), result));
            }
        }
        merge_targets(self.name(), results)
    }
}

/// `https://{instance}/api/v1/timelines/tag/{tag}`. A bare host gets https;
/// a full origin is used as is.
fn timeline_url(instance: &str, tag: &str) -> Result<url::Url> {
    let base = if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", instance.trim_end_matches('/'))
    };
    let mut url = url::Url::parse(&base).with_context(|| format!("Invalid Mastodon instance {instance}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Mastodon instance {instance} cannot be a base URL"))?
        .extend(["api", "v1", "timelines", "tag", tag.trim_start_matches('#')]);
    Ok(url)
}

fn status_items(instance: &str, statuses: Vec<Status>) -> Vec<RawItem> {
    statuses
        .into_iter()
        .map(|status| {
            let text = strip_tags(&status.content).trim().to_string();
            let title = format!("{}: {}", status.account.acct, truncate_chars(&text, TITLE_CHARS));
            let link = status.url.filter(|u| !u.is_empty()).unwrap_or(status.uri);
            // Status ids are only unique per instance.
            let id = format!("{}:{}", instance_host(instance), status.id);
            RawItem::new(SourceKind::Mastodon, Some(id), title, link, text)
        })
        .collect()
}

fn instance_host(instance: &str) -> &str {
    instance
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

#[async_trait]
impl SourceAdapter for MastodonSource {
    fn name(&self) -> &str {
        "mastodon"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mastodon
    }

    async fn fetch(&self) -> SourceOutcome {
        SourceOutcome::from_result(self.name(), self.fetch_all().await)
    }
}
