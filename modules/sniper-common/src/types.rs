use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// --- Source kinds ---

/// Origin of a raw item. `Web` is the derived kind produced by the one-hop
/// link crawler; every other kind maps to a source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Reddit,
    Twitter,
    BingNews,
    Rss,
    Mastodon,
    Web,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reddit => "reddit",
            Self::Twitter => "twitter",
            Self::BingNews => "bing-news",
            Self::Rss => "rss",
            Self::Mastodon => "mastodon",
            Self::Web => "web",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Raw items ---

/// One post, article or page as returned by a source adapter. Lives for a
/// single run only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub source: SourceKind,
    /// Origin-scoped identifier. `None` when the origin does not provide one.
    pub id: Option<String>,
    pub title: String,
    pub link: String,
    pub text: String,
}

impl RawItem {
    pub fn new(
        source: SourceKind,
        id: Option<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source,
            id: id.filter(|s| !s.is_empty()),
            title: title.into(),
            link: link.into(),
            text: text.into(),
        }
    }

    /// Identifier used for post-level dedup. Falls back to a synthetic id
    /// built from the source plus link, then title, then a hash of the body,
    /// so the same item always resolves to the same id across runs.
    pub fn resolved_id(&self) -> String {
        if let Some(id) = self.id.as_deref().filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        if !self.link.is_empty() {
            return format!("{}|{}", self.source, self.link);
        }
        if !self.title.is_empty() {
            return format!("{}|{}", self.source, self.title);
        }
        format!("{}|#{}", self.source, content_hash(&self.text))
    }

    /// Title and body joined by a blank line; the input to relevance and
    /// code extraction.
    pub fn combined_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.text)
    }
}

/// Hex-encoded SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// --- Code candidates ---

/// A newly discovered code together with the post it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeCandidate {
    pub source: SourceKind,
    pub post_id: String,
    pub title: String,
    pub link: String,
    pub code: String,
}

// --- Seen state ---

/// Everything ever processed. Both sets only grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenState {
    #[serde(default)]
    pub posts: BTreeSet<String>,
    #[serde(default)]
    pub codes: BTreeSet<String>,
}

impl SeenState {
    pub fn has_post(&self, id: &str) -> bool {
        self.posts.contains(id)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Returns true if the id was not already present.
    pub fn mark_post(&mut self, id: impl Into<String>) -> bool {
        self.posts.insert(id.into())
    }

    /// Returns true if the code was not already present.
    pub fn mark_code(&mut self, code: impl Into<String>) -> bool {
        self.codes.insert(code.into())
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.codes.is_empty()
    }
}
