// Notification model shared by every backend. Builders clamp text to the
// Discord embed limits so backends can post the fields verbatim.

pub mod backend;
pub mod discord;

use std::fmt::Display;

use crate::engine::RunOutput;
use crate::sources::truncate_chars;

pub use backend::NotifyBackend;
pub use discord::DiscordWebhook;

pub const DEFAULT_TITLE: &str = "Sora Sniper Status";
pub const FAILURE_TITLE: &str = "Sora Sniper Error";

pub const STATUS_COLOR: u32 = 0x00ff99;
pub const FAILURE_COLOR: u32 = 0xff4444;

/// Cap on the error text carried by a failure notification.
pub const FAILURE_MESSAGE_CHARS: usize = 200;

const MAX_TITLE_CHARS: usize = 256;
const MAX_SUMMARY_CHARS: usize = 4096;
const MAX_FIELD_NAME_CHARS: usize = 256;
const MAX_FIELD_VALUE_CHARS: usize = 1024;
/// Hard limit of fields per embed.
pub const MAX_EMBED_FIELDS: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyField {
    pub name: String,
    pub value: String,
}

impl NotifyField {
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = truncate_chars(name.as_ref(), MAX_FIELD_NAME_CHARS);
        Self {
            name: if name.is_empty() { "unknown".to_string() } else { name },
            value: truncate_chars(value.as_ref(), MAX_FIELD_VALUE_CHARS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub summary: String,
    pub color: u32,
    pub fields: Vec<NotifyField>,
}

impl Notification {
    /// Run summary plus one field per reported code, at most `max_fields`.
    pub fn status(output: &RunOutput, max_fields: usize) -> Self {
        let summary = format!(
            "Scanned {} items across sources.\nNew codes found: {}",
            output.stats.items_scanned,
            output.entries.len()
        );
        let fields = output
            .notifiable(max_fields.min(MAX_EMBED_FIELDS))
            .iter()
            .map(|entry| {
                let title = if entry.title.trim().is_empty() { "N/A" } else { entry.title.as_str() };
                let mut value = format!("Title: {title}\nCode: {}", entry.code);
                if !entry.link.trim().is_empty() {
                    value.push_str(&format!("\n[link]({})", entry.link));
                }
                NotifyField::new(entry.source.as_str(), value)
            })
            .collect();

        Self {
            title: DEFAULT_TITLE.to_string(),
            summary: truncate_chars(&summary, MAX_SUMMARY_CHARS),
            color: STATUS_COLOR,
            fields,
        }
    }

    /// Notification for a run that hit an unexpected error.
    pub fn failure(err: impl Display) -> Self {
        Self {
            title: FAILURE_TITLE.to_string(),
            summary: truncate_chars(&err.to_string(), FAILURE_MESSAGE_CHARS),
            color: FAILURE_COLOR,
            fields: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl AsRef<str>) -> Self {
        self.title = truncate_chars(title.as_ref(), MAX_TITLE_CHARS);
        self
    }
}
