// Code extractor: whole alphanumeric runs of a bounded length, uppercased,
// minus a stop list of known false positives.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use sniper_common::{CodeRules, SniperError};

/// Digit-only tokens shorter than this are never codes. Only reachable when
/// `CodeRules::min_len` is configured below it.
const MIN_DIGIT_ONLY_LEN: usize = 5;

#[derive(Debug, Clone)]
pub struct CodeExtractor {
    pattern: Regex,
    stop_words: HashSet<String>,
}

impl CodeExtractor {
    pub fn new(rules: &CodeRules) -> Result<Self, SniperError> {
        if rules.min_len == 0 || rules.min_len > rules.max_len {
            return Err(SniperError::Config(format!(
                "invalid code length bounds [{}, {}]",
                rules.min_len, rules.max_len
            )));
        }

        let flags = if rules.match_lowercase { "(?i)" } else { "" };
        let pattern = Regex::new(&format!(
            r"{flags}\b[A-Z0-9]{{{},{}}}\b",
            rules.min_len, rules.max_len
        ))
        .map_err(|e| SniperError::Config(format!("code pattern: {e}")))?;

        let stop_words = rules
            .stop_words
            .iter()
            .map(|w| w.trim().to_uppercase())
            .filter(|w| !w.is_empty())
            .collect();

        Ok(Self {
            pattern,
            stop_words,
        })
    }

    /// Every distinct code-shaped token in `text`, uppercased.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_uppercase())
            .filter(|token| !self.is_noise(token))
            .collect()
    }

    fn is_noise(&self, token: &str) -> bool {
        if self.stop_words.contains(token) {
            return true;
        }
        token.len() < MIN_DIGIT_ONLY_LEN && token.chars().all(|c| c.is_ascii_digit())
    }
}
