// Test doubles for adapters, page fetching and notification.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use sniper_common::{RawItem, SourceKind};

use crate::crawl::PageFetcher;
use crate::notify::{Notification, NotifyBackend};
use crate::sources::{SourceAdapter, SourceOutcome};

/// Item with an explicit id and link, empty title and text.
pub fn item(source: SourceKind, id: &str, link: &str) -> RawItem {
    RawItem::new(source, Some(id.to_string()), "", link, "")
}

/// Item with an explicit id, title and text, no link.
pub fn post(source: SourceKind, id: &str, title: &str, text: &str) -> RawItem {
    RawItem::new(source, Some(id.to_string()), title, "", text)
}

// --- MockSource ---

enum Behavior {
    Items(Vec<RawItem>),
    Fail(String),
    Panic,
}

/// Adapter that returns canned items, a canned failure, or panics.
pub struct MockSource {
    name: String,
    kind: SourceKind,
    behavior: Behavior,
}

impl MockSource {
    pub fn new(name: &str, kind: SourceKind, items: Vec<RawItem>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior: Behavior::Items(items),
        }
    }

    pub fn failing(name: &str, kind: SourceKind, error: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior: Behavior::Fail(error.to_string()),
        }
    }

    pub fn panicking(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior: Behavior::Panic,
        }
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self) -> SourceOutcome {
        match &self.behavior {
            Behavior::Items(items) => SourceOutcome::Fetched(items.clone()),
            Behavior::Fail(error) => SourceOutcome::Failed(error.clone()),
            Behavior::Panic => panic!("mock source {} blew up", self.name),
        }
    }
}

// --- MockPageFetcher ---

/// Serves canned HTML per URL; unknown URLs fail.
#[derive(Default)]
pub struct MockPageFetcher {
    pages: HashMap<String, String>,
    panics: HashSet<String>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_url(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Fetching `url` panics instead of returning.
    pub fn panic_on(mut self, url: &str) -> Self {
        self.panics.insert(url.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        if self.panics.contains(url) {
            panic!("mock fetch of {url} blew up");
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockPageFetcher: no page for {url}"))
    }
}

// --- RecordingNotifier ---

/// Keeps every notification it is handed. Clones share the same log, so a
/// test can keep one handle and pass the other to the code under test.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotifyBackend for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        if self.fail {
            anyhow::bail!("RecordingNotifier: delivery refused");
        }
        Ok(())
    }
}
