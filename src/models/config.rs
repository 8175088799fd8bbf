//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Source;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Pipeline ordering, timeout and pacing
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Operator-facing output
    #[serde(default)]
    pub output: OutputConfig,

    /// Destination for collected records
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub web3career: Web3CareerConfig,

    #[serde(default)]
    pub cryptojobslist: CryptoJobsListConfig,

    #[serde(default)]
    pub reddit: RedditConfig,

    #[serde(default)]
    pub twitter: TwitterConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.runner.collectors.is_empty() {
            return Err(AppError::config("runner.collectors is empty"));
        }
        if self.runner.timeout_secs == 0 {
            return Err(AppError::config("runner.timeout_secs must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::config("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::config("http.timeout_secs must be > 0"));
        }
        if self.web3career.limit == 0 {
            return Err(AppError::config("web3career.limit must be > 0"));
        }
        if self.reddit.limit_per_source == 0 {
            return Err(AppError::config("reddit.limit_per_source must be > 0"));
        }
        if !(10..=100).contains(&self.twitter.max_results) {
            return Err(AppError::config(
                "twitter.max_results must be between 10 and 100",
            ));
        }
        if self.store.kind == StoreKind::Postgres && self.store.table.trim().is_empty() {
            return Err(AppError::config("store.table is empty"));
        }
        url::Url::parse(&self.web3career.endpoint)?;
        url::Url::parse(&self.cryptojobslist.url)?;
        Ok(())
    }

    /// Preview size for a source, honouring per-source overrides.
    pub fn preview_count(&self, source: Source) -> usize {
        match source {
            Source::JobScrape => self.cryptojobslist.preview_count,
            _ => self.output.preview_count,
        }
    }
}

/// How the runner isolates each collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// Child process running `harvester collect <name>`
    #[default]
    Process,
    /// Tokio task inside the runner process
    Task,
}

/// Pipeline runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Collector names in execution order
    #[serde(default = "defaults::collectors")]
    pub collectors: Vec<String>,

    /// Wall-clock limit per collector in seconds
    #[serde(default = "defaults::collector_timeout")]
    pub timeout_secs: u64,

    /// Pause after every collector in seconds
    #[serde(default = "defaults::pause")]
    pub pause_secs: u64,

    /// Time allowed to reap a cancelled collector in seconds
    #[serde(default = "defaults::kill_grace")]
    pub kill_grace_secs: u64,

    #[serde(default)]
    pub isolation: Isolation,
}

impl RunnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            collectors: defaults::collectors(),
            timeout_secs: defaults::collector_timeout(),
            pause_secs: defaults::pause(),
            kill_grace_secs: defaults::kill_grace(),
            isolation: Isolation::default(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for API requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::http_timeout(),
        }
    }
}

/// Operator-facing output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of records printed after each collection
    #[serde(default = "defaults::preview_count")]
    pub preview_count: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            preview_count: defaults::preview_count(),
        }
    }
}

/// Kind of record destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Print only
    #[default]
    None,
    /// JSON lines on the local filesystem
    Local,
    /// Postgres table
    Postgres,
}

/// Record destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Existing directory receiving `{source}.jsonl` files
    #[serde(default = "defaults::local_dir")]
    pub local_dir: String,

    /// Existing table receiving inserted records
    #[serde(default = "defaults::table")]
    pub table: String,

    /// Environment variable holding the Postgres connection string
    #[serde(default = "defaults::uri_env")]
    pub uri_env: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            local_dir: defaults::local_dir(),
            table: defaults::table(),
            uri_env: defaults::uri_env(),
        }
    }
}

/// Job-board API collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Web3CareerConfig {
    #[serde(default = "defaults::web3career_endpoint")]
    pub endpoint: String,

    /// Maximum jobs requested
    #[serde(default = "defaults::web3career_limit")]
    pub limit: usize,

    #[serde(default = "defaults::enabled")]
    pub show_description: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Keys probed, in order, when the response is a mapping
    #[serde(default = "defaults::item_keys")]
    pub item_keys: Vec<String>,
}

impl Default for Web3CareerConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::web3career_endpoint(),
            limit: defaults::web3career_limit(),
            show_description: true,
            remote: None,
            country: None,
            tag: None,
            item_keys: defaults::item_keys(),
        }
    }
}

/// Job-board HTML scraper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoJobsListConfig {
    /// Listing page to fetch
    #[serde(default = "defaults::cryptojobslist_url")]
    pub url: String,

    /// Browser-like User-Agent; the site rejects bot agents
    #[serde(default = "defaults::browser_user_agent")]
    pub user_agent: String,

    /// Pause after the scrape in seconds
    #[serde(default = "defaults::politeness_delay")]
    pub politeness_delay_secs: u64,

    #[serde(default = "defaults::scrape_preview_count")]
    pub preview_count: usize,

    #[serde(default)]
    pub selectors: ListingSelectors,
}

impl Default for CryptoJobsListConfig {
    fn default() -> Self {
        Self {
            url: defaults::cryptojobslist_url(),
            user_agent: defaults::browser_user_agent(),
            politeness_delay_secs: defaults::politeness_delay(),
            preview_count: defaults::scrape_preview_count(),
            selectors: ListingSelectors::default(),
        }
    }
}

/// CSS selectors for the job listing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub table_body: String,
    pub row: String,
    /// Class marking advert rows that are not jobs
    pub ad_row_class: String,
    pub title: String,
    pub company: String,
    pub tags: String,
    pub tags_cell: String,
    pub salary: String,
    pub salary_marker: String,
    pub location: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            table_body: "table.job-preview-inline-table tbody".to_string(),
            row: r#"tr[role="button"]"#.to_string(),
            ad_row_class: "notAJobAd".to_string(),
            title: "a.job-title-text".to_string(),
            company: "a.job-company-name-text".to_string(),
            tags: "td.job-tags span.category".to_string(),
            tags_cell: "td.job-tags".to_string(),
            salary: "td span.align-middle".to_string(),
            salary_marker: r#"svg[stroke="currentColor"]"#.to_string(),
            location: "span.text-sm".to_string(),
        }
    }
}

/// Reddit collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default = "defaults::subreddits")]
    pub subreddits: Vec<String>,

    #[serde(default = "defaults::reddit_keywords")]
    pub keywords: Vec<String>,

    /// Items requested per subreddit and per keyword
    #[serde(default = "defaults::limit_per_source")]
    pub limit_per_source: usize,

    #[serde(default = "defaults::subreddit_pause")]
    pub subreddit_pause_ms: u64,

    #[serde(default = "defaults::search_pause")]
    pub search_pause_ms: u64,

    #[serde(default = "defaults::reddit_auth_url")]
    pub auth_url: String,

    #[serde(default = "defaults::reddit_api_base")]
    pub api_base: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            subreddits: defaults::subreddits(),
            keywords: defaults::reddit_keywords(),
            limit_per_source: defaults::limit_per_source(),
            subreddit_pause_ms: defaults::subreddit_pause(),
            search_pause_ms: defaults::search_pause(),
            auth_url: defaults::reddit_auth_url(),
            api_base: defaults::reddit_api_base(),
        }
    }
}

/// Twitter collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default = "defaults::twitter_queries")]
    pub queries: Vec<String>,

    /// Tweets per query; the API accepts 10..=100
    #[serde(default = "defaults::limit_per_source")]
    pub max_results: usize,

    /// Block until the rate-limit window resets instead of failing on 429
    #[serde(default = "defaults::enabled")]
    pub wait_on_rate_limit: bool,

    #[serde(default = "defaults::query_pause")]
    pub query_pause_ms: u64,

    #[serde(default = "defaults::twitter_api_base")]
    pub api_base: String,

    #[serde(default = "defaults::tweet_fields")]
    pub tweet_fields: Vec<String>,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            queries: defaults::twitter_queries(),
            max_results: defaults::limit_per_source(),
            wait_on_rate_limit: true,
            query_pause_ms: defaults::query_pause(),
            api_base: defaults::twitter_api_base(),
            tweet_fields: defaults::tweet_fields(),
        }
    }
}

mod defaults {
    // Runner defaults
    pub fn collectors() -> Vec<String> {
        vec![
            "job-api".into(),
            "job-scrape".into(),
            "social-a".into(),
            "social-b".into(),
        ]
    }
    pub fn collector_timeout() -> u64 {
        1800
    }
    pub fn pause() -> u64 {
        5
    }
    pub fn kill_grace() -> u64 {
        5
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; harvester/0.1)".into()
    }
    pub fn http_timeout() -> u64 {
        25
    }
    pub fn preview_count() -> usize {
        3
    }
    pub fn enabled() -> bool {
        true
    }

    // Store defaults
    pub fn local_dir() -> String {
        "data/records".into()
    }
    pub fn table() -> String {
        "collected_records".into()
    }
    pub fn uri_env() -> String {
        "POSTGRES_URI".into()
    }

    // Web3.Career defaults
    pub fn web3career_endpoint() -> String {
        "https://web3.career/api/v1".into()
    }
    pub fn web3career_limit() -> usize {
        100
    }
    pub fn item_keys() -> Vec<String> {
        vec!["jobs".into(), "data".into(), "results".into()]
    }

    // CryptoJobsList defaults
    pub fn cryptojobslist_url() -> String {
        "https://cryptojobslist.com/".into()
    }
    pub fn browser_user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36"
            .into()
    }
    pub fn politeness_delay() -> u64 {
        2
    }
    pub fn scrape_preview_count() -> usize {
        5
    }

    // Reddit defaults
    pub fn subreddits() -> Vec<String> {
        vec![
            "ethereum".into(),
            "soliditydevs".into(),
            "CryptoCurrency".into(),
            "cryptojobs".into(),
            "web3".into(),
        ]
    }
    pub fn reddit_keywords() -> Vec<String> {
        vec![
            "web3 developer salary".into(),
            "Coinbase hiring".into(),
            "blockchain skill demand".into(),
            "remote web3 role".into(),
        ]
    }
    pub fn limit_per_source() -> usize {
        10
    }
    pub fn subreddit_pause() -> u64 {
        1000
    }
    pub fn search_pause() -> u64 {
        2000
    }
    pub fn reddit_auth_url() -> String {
        "https://www.reddit.com/api/v1/access_token".into()
    }
    pub fn reddit_api_base() -> String {
        "https://oauth.reddit.com".into()
    }

    // Twitter defaults
    pub fn twitter_queries() -> Vec<String> {
        vec![
            "(#Web3Jobs OR #CryptoHiring OR #BlockchainCareers) -is:retweet lang:en".into(),
            r#"("web3 developer salary" OR "blockchain developer pay") -is:retweet lang:en"#
                .into(),
            "(from:Coinbase OR from:binance OR from:ethereum) (hiring OR jobs OR career)".into(),
            "#DeFiJobs -is:retweet lang:en".into(),
        ]
    }
    pub fn query_pause() -> u64 {
        1000
    }
    pub fn twitter_api_base() -> String {
        "https://api.twitter.com/2".into()
    }
    pub fn tweet_fields() -> Vec<String> {
        vec![
            "created_at".into(),
            "public_metrics".into(),
            "author_id".into(),
            "lang".into(),
            "geo".into(),
        ]
    }
}
