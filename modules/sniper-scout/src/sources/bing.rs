// Bing News Search v7. Enabled only when an API key is configured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sniper_common::{RawItem, SourceKind};

use super::{http_client, SourceAdapter, SourceOutcome, SOURCE_TIMEOUT};
use crate::retry::{with_retries, RetryPolicy};

const SEARCH_URL: &str = "https://api.bing.microsoft.com/v7.0/news/search";

pub struct BingNewsSource {
    client: reqwest::Client,
    api_key: String,
    keywords: Vec<String>,
    count: u32,
    retry: RetryPolicy,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    value: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    body: String,
}

impl BingNewsSource {
    pub fn new(api_key: String, keywords: Vec<String>, count: u32, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: http_client(SOURCE_TIMEOUT)?,
            api_key,
            keywords,
            count,
            retry,
            endpoint: SEARCH_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn query(&self) -> String {
        self.keywords.join(" OR ")
    }

    async fn search(&self) -> Result<Vec<RawItem>> {
        let query = self.query();
        let query = query.as_str();
        let response = with_retries("bing", self.retry, move || async move {
            let resp = self
                .client
                .get(&self.endpoint)
                .header("Ocp-Apim-Subscription-Key", &self.api_key)
                .query(&[
                    ("q", query.to_string()),
                    ("count", self.count.to_string()),
                    ("mkt", "en-US".to_string()),
                ])
                .send()
                .await
                .context("Bing request failed")?
                .error_for_status()
                .context("Bing returned error status")?;
            let parsed: NewsResponse = resp.json().await.context("Failed to parse Bing response")?;
            Ok(parsed)
        })
        .await?;

        Ok(article_items(response))
    }
}

fn article_items(response: NewsResponse) -> Vec<RawItem> {
    response
        .value
        .into_iter()
        .map(|article| {
            let text = format!("{} {}", article.description, article.body)
                .trim()
                .to_string();
            let id = (!article.url.is_empty()).then(|| article.url.clone());
            RawItem::new(SourceKind::BingNews, id, article.name, article.url, text)
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for BingNewsSource {
    fn name(&self) -> &str {
        "bing-news"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::BingNews
    }

    async fn fetch(&self) -> SourceOutcome {
        SourceOutcome::from_result(self.name(), self.search().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> BingNewsSource {
        BingNewsSource::new(
            "secret".into(),
            vec!["sora invite".into(), "sora code".into()],
            25,
            RetryPolicy::none(),
        )
        .unwrap()
        .with_endpoint(format!("{}/v7.0/news/search", server.uri()))
    }

    #[tokio::test]
    async fn sends_key_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7.0/news/search"))
            .and(header("Ocp-Apim-Subscription-Key", "secret"))
            .and(query_param("q", "sora invite OR sora code"))
            .and(query_param("count", "25"))
            .and(query_param("mkt", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {"name": "Sora opens up", "url": "https://news.example/a",
                     "description": "Invite code", "body": "QWERT9"},
                    {"name": "No url"}
                ]
            })))
            .mount(&server)
            .await;

        let items = match source(&server).fetch().await {
            SourceOutcome::Fetched(items) => items,
            SourceOutcome::Failed(e) => panic!("unexpected failure: {e}"),
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].resolved_id(), "https://news.example/a");
        assert_eq!(items[0].text, "Invite code QWERT9");
        assert!(items[1].resolved_id().starts_with("bing-news|"));
    }

    #[tokio::test]
    async fn missing_value_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        assert!(matches!(source(&server).fetch().await, SourceOutcome::Fetched(items) if items.is_empty()));
    }

    #[tokio::test]
    async fn unauthorized_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        assert!(matches!(source(&server).fetch().await, SourceOutcome::Failed(_)));
    }
}
