use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "sora invite",
    "sora 2 code",
    "sora invite code",
    "sora code",
    "sora2 invite",
];

pub const DEFAULT_STOP_WORDS: &[&str] = &["FREE", "CODE", "SORA", "OPENAI", "INVITE"];

pub const DEFAULT_SUBREDDITS: &[&str] = &["OpenAI", "ChatGPT", "SoraAi"];

pub const DEFAULT_MASTODON_HASHTAGS: &[&str] = &["sora", "sora2"];

/// Shape and exclusion list for code candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRules {
    pub min_len: usize,
    pub max_len: usize,
    pub stop_words: Vec<String>,
    /// Accept lowercase letters in the pattern (matches are still uppercased).
    pub match_lowercase: bool,
}

impl Default for CodeRules {
    fn default() -> Self {
        Self {
            min_len: 5,
            max_len: 8,
            stop_words: owned(DEFAULT_STOP_WORDS),
            match_lowercase: false,
        }
    }
}

/// Reddit password-grant credentials. All four must be set to use OAuth.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &preview(&self.client_id))
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Notification
    pub discord_webhook_url: Option<String>,
    pub notify_title: String,
    pub max_fields: usize,

    // Persistence
    pub seen_path: PathBuf,

    // Matching
    pub keywords: Vec<String>,
    pub code_rules: CodeRules,

    // Reddit
    pub reddit_enabled: bool,
    pub subreddits: Vec<String>,
    pub reddit_limit: u32,
    pub reddit_credentials: Option<RedditCredentials>,

    // Twitter via snscrape
    pub use_snscrape: bool,
    pub twitter_max_results: usize,

    // Bing News
    pub bing_api_key: Option<String>,
    pub bing_count: u32,

    // RSS
    pub rss_feeds: Vec<String>,
    pub rss_max_items: usize,

    // Mastodon
    pub mastodon_instances: Vec<String>,
    pub mastodon_hashtags: Vec<String>,

    // One-hop crawl
    pub crawl_enabled: bool,
    pub max_crawl_links: usize,

    // Retry policy for individual source calls
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            notify_title: "Sora Sniper Status".to_string(),
            max_fields: 12,
            seen_path: PathBuf::from("seen.json"),
            keywords: owned(DEFAULT_KEYWORDS),
            code_rules: CodeRules::default(),
            reddit_enabled: true,
            subreddits: owned(DEFAULT_SUBREDDITS),
            reddit_limit: 40,
            reddit_credentials: None,
            use_snscrape: false,
            twitter_max_results: 40,
            bing_api_key: None,
            bing_count: 25,
            rss_feeds: Vec::new(),
            rss_max_items: 30,
            mastodon_instances: Vec::new(),
            mastodon_hashtags: owned(DEFAULT_MASTODON_HASHTAGS),
            crawl_enabled: true,
            max_crawl_links: 20,
            max_retries: 2,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    /// Unset or unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok());
        config.log_keys();
        config
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vars = Vars(lookup);
        let defaults = Self::default();

        let reddit_credentials = match (
            vars.optional("REDDIT_CLIENT_ID"),
            vars.optional("REDDIT_CLIENT_SECRET"),
            vars.optional("REDDIT_USERNAME"),
            vars.optional("REDDIT_PASSWORD"),
        ) {
            (Some(client_id), Some(client_secret), Some(username), Some(password)) => {
                Some(RedditCredentials {
                    client_id,
                    client_secret,
                    username,
                    password,
                })
            }
            _ => None,
        };

        Self {
            discord_webhook_url: vars.optional("DISCORD_WEBHOOK_URL"),
            notify_title: vars.optional("NOTIFY_TITLE").unwrap_or(defaults.notify_title),
            max_fields: vars.parsed("MAX_FIELDS", defaults.max_fields),
            seen_path: vars
                .optional("SEEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.seen_path),
            keywords: vars.list("SNIPER_KEYWORDS").unwrap_or(defaults.keywords),
            code_rules: CodeRules {
                min_len: vars.parsed("CODE_MIN_LEN", defaults.code_rules.min_len),
                max_len: vars.parsed("CODE_MAX_LEN", defaults.code_rules.max_len),
                stop_words: vars.list("CODE_STOP_WORDS").unwrap_or(defaults.code_rules.stop_words),
                match_lowercase: vars.parsed(
                    "CODE_MATCH_LOWERCASE",
                    defaults.code_rules.match_lowercase,
                ),
            },
            reddit_enabled: vars.parsed("ENABLE_REDDIT", defaults.reddit_enabled),
            subreddits: vars.list("SUBREDDITS").unwrap_or(defaults.subreddits),
            reddit_limit: vars.parsed("REDDIT_LIMIT", defaults.reddit_limit),
            reddit_credentials,
            use_snscrape: vars.parsed("USE_SNSCRAPE", defaults.use_snscrape),
            twitter_max_results: vars.parsed("TWITTER_MAX_RESULTS", defaults.twitter_max_results),
            bing_api_key: vars.optional("BING_API_KEY"),
            bing_count: vars.parsed("BING_COUNT", defaults.bing_count),
            rss_feeds: vars.list("RSS_FEEDS").unwrap_or_default(),
            rss_max_items: vars.parsed("RSS_MAX_ITEMS", defaults.rss_max_items),
            mastodon_instances: vars.list("MASTODON_INSTANCES").unwrap_or_default(),
            mastodon_hashtags: vars.list("MASTODON_HASHTAGS").unwrap_or(defaults.mastodon_hashtags),
            crawl_enabled: vars.parsed("ENABLE_CRAWL", defaults.crawl_enabled),
            max_crawl_links: vars.parsed("MAX_CRAWL_LINKS", defaults.max_crawl_links),
            max_retries: vars.parsed("MAX_RETRIES", defaults.max_retries),
            retry_delay: Duration::from_millis(vars.parsed(
                "RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )),
        }
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DISCORD_WEBHOOK_URL: {}", preview_opt(&self.discord_webhook_url));
        tracing::info!("  BING_API_KEY: {}", preview_opt(&self.bing_api_key));
        tracing::info!(
            "  REDDIT oauth: {}",
            if self.reddit_credentials.is_some() { "configured" } else { "<not set>" }
        );
        tracing::info!("  SEEN_PATH: {}", self.seen_path.display());
        tracing::info!(
            keywords = self.keywords.len(),
            subreddits = self.subreddits.len(),
            rss_feeds = self.rss_feeds.len(),
            mastodon_instances = self.mastodon_instances.len(),
            use_snscrape = self.use_snscrape,
            crawl_enabled = self.crawl_enabled,
            "  Sources"
        );
    }
}

fn preview(val: &str) -> String {
    let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.len())
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Trimmed variable lookups; blank values count as unset.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Comma-separated list. `None` when the variable is unset or has no entries.
    fn list(&self, key: &str) -> Option<Vec<String>> {
        let values = split_list(&self.optional(key)?);
        (!values.is_empty()).then_some(values)
    }

    fn parsed<T: FromStr + Copy>(&self, key: &str, default: T) -> T {
        match self.optional(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key, value = raw.as_str(), "Invalid config value, using default");
                default
            }),
            None => default,
        }
    }
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_lookup_gives_defaults() {
        let config = config_from(&[]);
        let defaults = Config::default();
        assert_eq!(config.code_rules, defaults.code_rules);
        assert_eq!(config.subreddits, defaults.subreddits);
        assert_eq!(config.keywords, defaults.keywords);
        assert!(config.discord_webhook_url.is_none());
        assert!(config.reddit_credentials.is_none());
        assert!(config.rss_feeds.is_empty());
    }

    #[test]
    fn code_bounds_and_lists_are_read() {
        let config = config_from(&[
            ("CODE_MIN_LEN", "6"),
            ("CODE_MAX_LEN", " 10 "),
            ("CODE_MATCH_LOWERCASE", "true"),
            ("RSS_FEEDS", "https://a.example/feed, https://b.example/rss"),
            ("RETRY_DELAY_MS", "250"),
        ]);
        assert_eq!(config.code_rules.min_len, 6);
        assert_eq!(config.code_rules.max_len, 10);
        assert!(config.code_rules.match_lowercase);
        assert_eq!(config.rss_feeds, vec!["https://a.example/feed", "https://b.example/rss"]);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("CODE_MIN_LEN", "five"),
            ("MAX_CRAWL_LINKS", "-3"),
            ("ENABLE_REDDIT", "nope"),
        ]);
        assert_eq!(config.code_rules.min_len, 5);
        assert_eq!(config.max_crawl_links, 20);
        assert!(config.reddit_enabled);
    }

    #[test]
    fn reddit_credentials_need_all_four() {
        let partial = config_from(&[
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "bot"),
        ]);
        assert!(partial.reddit_credentials.is_none());

        let blank_password = config_from(&[
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "bot"),
            ("REDDIT_PASSWORD", "   "),
        ]);
        assert!(blank_password.reddit_credentials.is_none());

        let full = config_from(&[
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "bot"),
            ("REDDIT_PASSWORD", "pw"),
        ]);
        let creds = full.reddit_credentials.unwrap();
        assert_eq!(creds.username, "bot");
        assert_eq!(creds.password, "pw");
    }

    #[test]
    fn empty_list_counts_as_unset() {
        let config = config_from(&[
            ("SUBREDDITS", " , ,"),
            ("SNIPER_KEYWORDS", ""),
            ("DISCORD_WEBHOOK_URL", "  "),
        ]);
        assert_eq!(config.subreddits, Config::default().subreddits);
        assert_eq!(config.keywords, Config::default().keywords);
        assert!(config.discord_webhook_url.is_none());
    }

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" a, b ,,c , "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.code_rules.min_len, 5);
        assert_eq!(config.code_rules.max_len, 8);
        assert_eq!(config.max_fields, 12);
        assert_eq!(config.max_crawl_links, 20);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.subreddits, vec!["OpenAI", "ChatGPT", "SoraAi"]);
        assert!(config.keywords.contains(&"sora invite".to_string()));
    }

    #[test]
    fn preview_truncates_secrets() {
        assert_eq!(preview("abcdefghij"), "abcde...(10 chars)");
        assert_eq!(preview("ab"), "ab...(2 chars)");
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = RedditCredentials {
            client_id: "client-id-value".into(),
            client_secret: "super-secret".into(),
            username: "bot".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
    }
}
