use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::join_all;
use futures::FutureExt;
use sniper_common::{CodeCandidate, RawItem, SeenState};
use tracing::{debug, info, warn};

use crate::crawl::LinkCrawler;
use crate::extractor::CodeExtractor;
use crate::filter::KeywordFilter;
use crate::sources::{SourceAdapter, SourceOutcome};
use crate::stats::{RunStats, SourceReport};

/// Result of one aggregation pass.
#[derive(Debug, Default)]
pub struct RunOutput {
    /// Every newly discovered code, in discovery order.
    pub entries: Vec<CodeCandidate>,
    pub stats: RunStats,
}

impl RunOutput {
    /// Entries handed to the notifier. Codes past the cap stay marked seen
    /// and are never reported.
    pub fn notifiable(&self, cap: usize) -> &[CodeCandidate] {
        &self.entries[..self.entries.len().min(cap)]
    }
}

pub struct Aggregator {
    filter: KeywordFilter,
    extractor: CodeExtractor,
    crawler: Option<LinkCrawler>,
    max_links: usize,
}

impl Aggregator {
    pub fn new(filter: KeywordFilter, extractor: CodeExtractor) -> Self {
        Self {
            filter,
            extractor,
            crawler: None,
            max_links: 0,
        }
    }

    pub fn with_crawler(mut self, crawler: LinkCrawler, max_links: usize) -> Self {
        self.crawler = Some(crawler);
        self.max_links = max_links;
        self
    }

    /// Fetch every adapter, dedupe against `seen` (updating it in place),
    /// then optionally crawl one hop and run the pages through the same pass.
    /// A panicking adapter is reported as failed; the others still count.
    pub async fn run(&self, adapters: &[Box<dyn SourceAdapter>], seen: &mut SeenState) -> RunOutput {
        let mut stats = RunStats::default();

        let outcomes = join_all(adapters.iter().map(|adapter| {
            AssertUnwindSafe(adapter.fetch()).catch_unwind().map(move |result| {
                result.unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    warn!(source = adapter.name(), error = message.as_str(), "Source panicked");
                    SourceOutcome::Failed(format!("panicked: {message}"))
                })
            })
        }))
        .await;

        let mut items: Vec<RawItem> = Vec::new();
        for (adapter, outcome) in adapters.iter().zip(outcomes) {
            let report = match outcome {
                SourceOutcome::Fetched(mut batch) => {
                    let count = batch.len();
                    items.append(&mut batch);
                    SourceReport {
                        name: adapter.name().to_string(),
                        kind: adapter.kind(),
                        items: count,
                        error: None,
                    }
                }
                SourceOutcome::Failed(error) => SourceReport {
                    name: adapter.name().to_string(),
                    kind: adapter.kind(),
                    items: 0,
                    error: Some(error),
                },
            };
            stats.sources.push(report);
        }

        let links = match &self.crawler {
            Some(_) => LinkCrawler::candidate_links(&items, seen, self.max_links),
            None => Vec::new(),
        };

        // Adapter items are marked before any page is fetched, so a crash
        // in the crawl still leaves their progress in `seen`.
        let mut entries = self.process(items, seen, &mut stats);

        if let Some(crawler) = &self.crawler {
            if !links.is_empty() {
                let pages = crawler.crawl(&links).await;
                stats.items_crawled = pages.len();
                entries.extend(self.process(pages, seen, &mut stats));
            }
        }

        info!(
            scanned = stats.items_scanned,
            relevant = stats.posts_relevant,
            new_codes = stats.new_codes,
            "Aggregation complete"
        );
        RunOutput { entries, stats }
    }

    /// Sequential dedupe pass. Items are visited in order, so on a tie the
    /// earlier source claims the code.
    pub fn process(&self, items: Vec<RawItem>, seen: &mut SeenState, stats: &mut RunStats) -> Vec<CodeCandidate> {
        let mut entries = Vec::new();

        for item in items {
            stats.items_scanned += 1;
            let post_id = item.resolved_id();
            if seen.has_post(&post_id) {
                stats.posts_skipped += 1;
                continue;
            }

            let text = item.combined_text();
            if !self.filter.is_relevant(&text) {
                stats.posts_irrelevant += 1;
                seen.mark_post(post_id);
                continue;
            }
            stats.posts_relevant += 1;

            for code in self.extractor.extract(&text) {
                if !seen.mark_code(code.clone()) {
                    continue;
                }
                debug!(code = code.as_str(), post_id = post_id.as_str(), source = %item.source, "New code");
                entries.push(CodeCandidate {
                    source: item.source,
                    post_id: post_id.clone(),
                    title: item.title.clone(),
                    link: item.link.clone(),
                    code,
                });
            }
            seen.mark_post(post_id);
        }

        stats.new_codes += entries.len();
        entries
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniper_common::{CodeRules, SourceKind};

    use crate::testing::{post, MockPageFetcher, MockSource};

    fn aggregator() -> Aggregator {
        Aggregator::new(
            KeywordFilter::new(sniper_common::config::DEFAULT_KEYWORDS),
            CodeExtractor::new(&CodeRules::default()).unwrap(),
        )
    }

    #[test]
    fn irrelevant_posts_are_marked_without_extraction() {
        let mut seen = SeenState::default();
        let mut stats = RunStats::default();
        let entries = aggregator().process(
            vec![post(SourceKind::Reddit, "p1", "Random post", "ABCDEF here")],
            &mut seen,
            &mut stats,
        );
        assert!(entries.is_empty());
        assert!(seen.has_post("p1"));
        assert!(!seen.has_code("ABCDEF"));
        assert_eq!(stats.posts_irrelevant, 1);
    }

    #[test]
    fn relevant_post_with_stop_words_only_is_marked() {
        let mut seen = SeenState::default();
        let entries = aggregator().process(
            vec![post(SourceKind::Reddit, "p1", "Sora invite", "FREE CODE SORA")],
            &mut seen,
            &mut RunStats::default(),
        );
        assert!(entries.is_empty());
        assert!(seen.has_post("p1"));
    }

    #[test]
    fn one_post_yields_one_entry_per_code() {
        let mut seen = SeenState::default();
        let mut stats = RunStats::default();
        let entries = aggregator().process(
            vec![post(SourceKind::Rss, "p1", "sora code drop", "AB12C3 and ZZ99YY")],
            &mut seen,
            &mut stats,
        );
        let codes: Vec<_> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["AB12C3", "ZZ99YY"]);
        assert!(entries.iter().all(|e| e.post_id == "p1"));
        assert_eq!(stats.new_codes, 2);
    }

    #[test]
    fn duplicate_post_within_a_run_is_skipped() {
        let mut seen = SeenState::default();
        let mut stats = RunStats::default();
        let entries = aggregator().process(
            vec![
                post(SourceKind::Rss, "same", "sora code", "AB12C3"),
                post(SourceKind::Rss, "same", "sora code", "QWERT9"),
            ],
            &mut seen,
            &mut stats,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(stats.posts_skipped, 1);
    }

    #[test]
    fn notifiable_caps_entries() {
        let mut seen = SeenState::default();
        let mut stats = RunStats::default();
        let entries = aggregator().process(
            vec![post(SourceKind::Reddit, "p", "sora code", "AAAAA1 BBBBB2 CCCCC3")],
            &mut seen,
            &mut stats,
        );
        let output = RunOutput { entries, stats };
        assert_eq!(output.notifiable(2).len(), 2);
        assert_eq!(output.notifiable(12).len(), 3);
        assert!(seen.has_code("CCCCC3"));
    }

    #[tokio::test]
    async fn failed_source_is_reported_and_others_still_count() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(MockSource::failing("reddit", SourceKind::Reddit, "503")),
            Box::new(MockSource::new(
                "rss",
                SourceKind::Rss,
                vec![post(SourceKind::Rss, "r1", "sora invite", "XK42PQ")],
            )),
        ];
        let mut seen = SeenState::default();
        let output = aggregator().run(&adapters, &mut seen).await;

        assert_eq!(output.entries.len(), 1);
        assert_eq!(output.stats.sources.len(), 2);
        assert_eq!(output.stats.sources[0].error.as_deref(), Some("503"));
        assert_eq!(output.stats.sources[1].items, 1);
    }

    #[tokio::test]
    async fn panicking_source_does_not_cost_the_others() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(MockSource::panicking("twitter", SourceKind::Twitter)),
            Box::new(MockSource::new(
                "reddit",
                SourceKind::Reddit,
                vec![post(SourceKind::Reddit, "t3_ok", "sora invite", "HJ45KL")],
            )),
        ];
        let mut seen = SeenState::default();
        let output = aggregator().run(&adapters, &mut seen).await;

        assert_eq!(output.entries.len(), 1);
        assert_eq!(output.entries[0].code, "HJ45KL");
        let error = output.stats.sources[0].error.as_deref().unwrap();
        assert!(error.contains("mock source twitter blew up"));
        assert_eq!(output.stats.sources_failed(), 1);
        assert!(seen.has_code("HJ45KL"));
    }

    #[test]
    fn panic_message_handles_both_payload_types() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(static_str.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn crawled_pages_join_the_pass() {
        let fetcher = MockPageFetcher::new().on_url(
            "https://blog.example/post",
            "<title>Sora invite codes</title><p>Try QZ7K2M today</p>",
        );
        let aggregator = aggregator().with_crawler(LinkCrawler::new(Box::new(fetcher)), 20);

        let mut linking = post(SourceKind::BingNews, "b1", "Unrelated headline", "");
        linking.link = "https://blog.example/post".into();
        let adapters: Vec<Box<dyn SourceAdapter>> =
            vec![Box::new(MockSource::new("bing-news", SourceKind::BingNews, vec![linking]))];

        let mut seen = SeenState::default();
        let output = aggregator.run(&adapters, &mut seen).await;

        assert_eq!(output.stats.items_crawled, 1);
        assert_eq!(output.entries.len(), 1);
        assert_eq!(output.entries[0].source, SourceKind::Web);
        assert_eq!(output.entries[0].code, "QZ7K2M");
        assert_eq!(output.stats.new_codes, 1);
        assert_eq!(output.stats.items_scanned, 2);
        assert!(seen.has_post("b1"));
        assert!(seen.has_post("web|https://blog.example/post"));

        // Second run: the page is already processed and is not fetched again.
        let again = aggregator.run(&adapters, &mut seen).await;
        assert_eq!(again.stats.items_crawled, 0);
        assert!(again.entries.is_empty());
    }
}
