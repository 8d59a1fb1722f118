// Twitter/X via the `snscrape` CLI. Optional: the binary has to be on PATH.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sniper_common::{RawItem, SourceKind};
use tracing::info;

use super::{truncate_chars, SourceAdapter, SourceOutcome};

const SNSCRAPE_TIMEOUT: Duration = Duration::from_secs(120);
const TITLE_CHARS: usize = 80;

pub struct TwitterSource {
    program: String,
    keywords: Vec<String>,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct ScrapedTweet {
    id: serde_json::Value,
    #[serde(default, alias = "rawContent")]
    content: String,
}

impl TwitterSource {
    pub fn new(keywords: Vec<String>, max_results: usize) -> Self {
        Self {
            program: "snscrape".to_string(),
            keywords,
            max_results,
        }
    }

    /// Use a different executable in place of `snscrape`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn query(&self) -> String {
        let terms: Vec<String> = self.keywords.iter().map(|k| format!("\"{k}\"")).collect();
        format!("{} lang:en", terms.join(" OR "))
    }

    async fn run_snscrape(&self) -> Result<Vec<RawItem>> {
        let query = self.query();
        info!(program = self.program.as_str(), query = query.as_str(), "Running snscrape");

        let output = tokio::time::timeout(
            SNSCRAPE_TIMEOUT,
            tokio::process::Command::new(&self.program)
                .arg("--jsonl")
                .arg(format!("--max-results={}", self.max_results))
                .arg("twitter-search")
                .arg(&query)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .context("snscrape timed out")?
        .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("snscrape exited with {}: {}", output.status, stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_jsonl(&stdout, self.max_results))
    }
}

/// One item per JSON line; unparseable lines are skipped.
fn parse_jsonl(output: &str, max_results: usize) -> Vec<RawItem> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<ScrapedTweet>(line).ok())
        .filter_map(|tweet| {
            let id = match tweet.id {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(RawItem::new(
                SourceKind::Twitter,
                Some(id.clone()),
                truncate_chars(&tweet.content, TITLE_CHARS),
                format!("https://twitter.com/i/web/status/{id}"),
                tweet.content,
            ))
        })
        .take(max_results)
        .collect()
}

#[async_trait]
impl SourceAdapter for TwitterSource {
    fn name(&self) -> &str {
        "twitter"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Twitter
    }

    async fn fetch(&self) -> SourceOutcome {
        SourceOutcome::from_result(self.name(), self.run_snscrape().await)
    }
}
