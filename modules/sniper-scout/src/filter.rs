// Relevance filter: plain case-insensitive substring match against a
// configured phrase list.

/// Decides whether an item's text is about the tracked event.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    phrases: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// True iff `text` contains any phrase, ignoring case. Not word-boundary
    /// aware: a phrase inside a longer word still counts.
    pub fn is_relevant(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let haystack = text.to_lowercase();
        self.phrases.iter().any(|p| haystack.contains(p.as_str()))
    }

    #[cfg(test)]
    fn phrases(&self) -> &[String] {
        &self.phrases
    }
}
