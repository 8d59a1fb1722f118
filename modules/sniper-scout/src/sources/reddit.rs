// Reddit: newest posts per subreddit. Uses OAuth (password grant) when
// credentials are configured, the public JSON listing otherwise.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sniper_common::config::RedditCredentials;
use sniper_common::{RawItem, SourceKind};
use tracing::{info, warn};

use super::{http_client, merge_targets, SourceAdapter, SourceOutcome, SOURCE_TIMEOUT};
use crate::retry::{with_retries, RetryPolicy};

const PUBLIC_BASE: &str = "https://www.reddit.com";
const OAUTH_BASE: &str = "https://oauth.reddit.com";

pub struct RedditSource {
    client: reqwest::Client,
    subreddits: Vec<String>,
    limit: u32,
    credentials: Option<RedditCredentials>,
    retry: RetryPolicy,
    public_base: String,
    oauth_base: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(default)]
    data: RedditPost,
}

#[derive(Debug, Default, Deserialize)]
struct RedditPost {
    /// Fullname, e.g. `t3_abc123`.
    name: Option<String>,
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    permalink: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl RedditSource {
    pub fn new(
        subreddits: Vec<String>,
        limit: u32,
        credentials: Option<RedditCredentials>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(SOURCE_TIMEOUT)?,
            subreddits,
            limit,
            credentials,
            retry,
            public_base: PUBLIC_BASE.to_string(),
            oauth_base: OAUTH_BASE.to_string(),
        })
    }

    /// Point both endpoints at another host (used by tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        self.public_base = base.clone();
        self.oauth_base = base;
        self
    }

    async fn access_token(&self, creds: &RedditCredentials) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/api/v1/access_token", self.public_base))
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await
            .context("Reddit token request failed")?
            .error_for_status()
            .context("Reddit token request rejected")?;

        let token: TokenResponse = resp.json().await.context("Failed to parse Reddit token")?;
        Ok(token.access_token)
    }

    async fn fetch_subreddit(&self, sub: &str, token: Option<&str>) -> Result<Vec<RawItem>> {
        let label = format!("reddit-{sub}");
        let listing = with_retries(&label, self.retry, move || async move {
            let request = match token {
                Some(token) => self
                    .client
                    .get(format!("{}/r/{sub}/new", self.oauth_base))
                    .bearer_auth(token),
                None => self
                    .client
                    .get(format!("{}/r/{sub}/new.json", self.public_base)),
            };
            let resp = request
                .query(&[("raw_json", "1".to_string()), ("limit", self.limit.to_string())])
                .send()
                .await
                .context("Reddit request failed")?
                .error_for_status()
                .context("Reddit returned error status")?;
            let listing: Listing = resp.json().await.context("Reddit listing had no children")?;
            Ok(listing)
        })
        .await?;

        Ok(listing_items(listing))
    }

    async fn fetch_all(&self) -> Result<Vec<RawItem>> {
        let token = match &self.credentials {
            Some(creds) => match self.access_token(creds).await {
                Ok(token) => {
                    info!("Reddit OAuth token acquired");
                    Some(token)
                }
                Err(e) => {
                    warn!(error = %e, "Reddit OAuth failed, using public listing");
                    None
                }
            },
            None => None,
        };

        let mut results = Vec::with_capacity(self.subreddits.len());
        for sub in &self.subreddits {
            let result = self.fetch_subreddit(sub, token.as_deref()).await;
            results.push((format!("r/{sub}"), result));
        }
        merge_targets(self.name(), results)
    }
}

fn listing_items(listing: Listing) -> Vec<RawItem> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| {
            let post = child.data;
            RawItem::new(
                SourceKind::Reddit,
                post.name.or(post.id),
                post.title,
                format!("https://reddit.com{}", post.permalink),
                post.selftext,
            )
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for RedditSource {
    fn name(&self) -> &str {
        "reddit"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    async fn fetch(&self) -> SourceOutcome {
        SourceOutcome::from_result(self.name(), self.fetch_all().await)
    }
}
