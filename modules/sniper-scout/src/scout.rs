use std::panic::AssertUnwindSafe;

use anyhow::Result;
use futures::FutureExt;
use sniper_common::Config;
use tracing::{error, info, warn};

use crate::crawl::{HttpPageFetcher, LinkCrawler};
use crate::engine::{panic_message, Aggregator, RunOutput};
use crate::extractor::CodeExtractor;
use crate::filter::KeywordFilter;
use crate::notify::{Notification, NotifyBackend, DEFAULT_TITLE};
use crate::seen::SeenStore;
use crate::sources::{adapters_from_config, SourceAdapter};

/// One complete run: load seen state, aggregate, persist, notify.
pub struct Scout {
    aggregator: Aggregator,
    adapters: Vec<Box<dyn SourceAdapter>>,
    store: SeenStore,
    notifier: Box<dyn NotifyBackend>,
    notify_title: String,
    max_fields: usize,
}

impl Scout {
    pub fn new(
        aggregator: Aggregator,
        adapters: Vec<Box<dyn SourceAdapter>>,
        store: SeenStore,
        notifier: Box<dyn NotifyBackend>,
    ) -> Self {
        Self {
            aggregator,
            adapters,
            store,
            notifier,
            notify_title: DEFAULT_TITLE.to_string(),
            max_fields: 12,
        }
    }

    /// Wire up filter, extractor, adapters, crawler and seen store from config.
    pub fn from_config(config: &Config, notifier: Box<dyn NotifyBackend>) -> Result<Self> {
        let filter = KeywordFilter::new(&config.keywords);
        let extractor = CodeExtractor::new(&config.code_rules)?;
        let mut aggregator = Aggregator::new(filter, extractor);
        if config.crawl_enabled && config.max_crawl_links > 0 {
            let crawler = LinkCrawler::new(Box::new(HttpPageFetcher::new()?));
            aggregator = aggregator.with_crawler(crawler, config.max_crawl_links);
        }

        let adapters = adapters_from_config(config)?;
        let store = SeenStore::new(&config.seen_path);

        Ok(Self::new(aggregator, adapters, store, notifier)
            .with_notify_title(&config.notify_title)
            .with_max_fields(config.max_fields))
    }

    pub fn with_notify_title(mut self, title: &str) -> Self {
        self.notify_title = title.to_string();
        self
    }

    pub fn with_max_fields(mut self, max_fields: usize) -> Self {
        self.max_fields = max_fields;
        self
    }

    /// Run once. The seen state is saved even if aggregation blows up; in
    /// that case a failure notification goes out and the error is returned.
    pub async fn run(&self) -> Result<RunOutput> {
        let mut seen = self.store.load();

        let result = AssertUnwindSafe(self.aggregator.run(&self.adapters, &mut seen))
            .catch_unwind()
            .await;

        self.store.save(&seen);

        match result {
            Ok(output) => {
                info!("{}", output.stats);
                let notification =
                    Notification::status(&output, self.max_fields).with_title(&self.notify_title);
                self.deliver(&notification).await;
                Ok(output)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(error = message.as_str(), "Aggregation aborted");
                self.deliver(&Notification::failure(&message)).await;
                anyhow::bail!("aggregation aborted: {message}")
            }
        }
    }

    async fn deliver(&self, notification: &Notification) {
        match self.notifier.send(notification).await {
            Ok(()) => info!(fields = notification.fields.len(), "Notification sent"),
            Err(e) => warn!(error = %e, "Failed to send notification"),
        }
    }
}
