// src/collectors/twitter.rs

//! Twitter recent-search collector.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};

use super::Collector;
use crate::error::Result;
use crate::events::{CollectorEvent, EventSink};
use crate::models::{NormalizedRecord, PLACEHOLDER, Source, TwitterConfig};
use crate::normalize::{Collection, RecordSet, json_kind, optional_text, text_field, value_or_null};
use crate::utils::http;

pub const TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";

const STATUS_BASE: &str = "https://twitter.com/i/web/status";
const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";
/// Wait used when a 429 carries no reset header
const DEFAULT_RESET_WAIT: Duration = Duration::from_secs(60);

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("static pattern"));

pub struct TwitterCollector {
    client: Client,
    config: TwitterConfig,
    token: String,
}

impl TwitterCollector {
    pub fn new(client: Client, config: TwitterConfig, token: impl Into<String>) -> Self {
        Self {
            client,
            config,
            token: token.into(),
        }
    }

    /// Run one recent search, waiting out rate limits when configured.
    ///
    /// Waits are unbounded; only the runner's timeout ends them.
    async fn search(&self, query: &str, events: &dyn EventSink) -> Result<Value> {
        let url = format!(
            "{}/tweets/search/recent",
            self.config.api_base.trim_end_matches('/')
        );
        let params = [
            ("query", query.to_string()),
            ("max_results", self.config.max_results.to_string()),
            ("tweet.fields", self.config.tweet_fields.join(",")),
        ];

        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&params)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS
                && self.config.wait_on_rate_limit
            {
                let wait = reset_wait(response.headers(), Utc::now());
                events.emit(CollectorEvent::Diagnostic {
                    source: Source::SocialB,
                    message: format!(
                        "Rate limited; waiting {}s before retrying '{query}'",
                        wait.as_secs()
                    ),
                });
                tokio::time::sleep(wait).await;
                continue;
            }

            return http::read_json(response, &format!("social-b search '{query}'")).await;
        }
    }
}

#[async_trait]
impl Collector for TwitterCollector {
    fn source(&self) -> Source {
        Source::SocialB
    }

    async fn collect(&self, events: &dyn EventSink) -> Result<Collection> {
        let source = self.source();
        let mut set = RecordSet::new(source, events);

        for query in &self.config.queries {
            events.emit(CollectorEvent::Fetching {
                source,
                target: format!("recent tweets for '{query}'"),
            });
            let payload = self.search(query, events).await?;
            let added = absorb_response(&payload, query, Utc::now(), events, &mut set);
            events.emit(CollectorEvent::Progress {
                source,
                scope: format!("query '{query}'"),
                count: added,
            });
            if self.config.query_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.query_pause_ms)).await;
            }
        }

        Ok(set.finish())
    }
}

/// Time to sleep until the window named by the reset header opens.
pub fn reset_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
    headers
        .get(RATE_LIMIT_RESET)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(|reset| {
            let remaining = (reset - now.timestamp()).max(0) as u64;
            Duration::from_secs(remaining + 1)
        })
        .unwrap_or(DEFAULT_RESET_WAIT)
}

/// Normalize the tweets of one search response into `set`.
///
/// Partial errors reported next to the data become diagnostics. A
/// response without `data` means the query matched nothing; one that is not
/// a mapping is reported as an unrecognized shape. Returns the number of
/// records added.
pub fn absorb_response(
    payload: &Value,
    query: &str,
    collected_at: DateTime<Utc>,
    events: &dyn EventSink,
    set: &mut RecordSet<'_>,
) -> usize {
    let Some(body) = payload.as_object() else {
        set.unrecognized(format!(
            "search '{query}' returned a {}, expected a mapping",
            json_kind(payload)
        ));
        return 0;
    };

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        for error in errors {
            let message = error
                .get("detail")
                .or_else(|| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            events.emit(CollectorEvent::Diagnostic {
                source: Source::SocialB,
                message: format!("API reported for '{query}': {message}"),
            });
        }
    }

    let tweets = match body.get("data") {
        None | Some(Value::Null) => return 0,
        Some(Value::Array(tweets)) => tweets,
        Some(other) => {
            set.unrecognized(format!("tweet data for '{query}' is a {}", json_kind(other)));
            return 0;
        }
    };

    let mut added = 0;
    for tweet in tweets {
        match tweet.as_object() {
            Some(fields) => {
                if set.push_unique(normalize_tweet(fields, query, collected_at)) {
                    added += 1;
                }
            }
            None => set.skip(format!("expected a tweet mapping, found {}", json_kind(tweet))),
        }
    }
    added
}

/// Map one tweet onto a record; never fails.
pub fn normalize_tweet(
    fields: &Map<String, Value>,
    query: &str,
    collected_at: DateTime<Utc>,
) -> NormalizedRecord {
    let id = text_field(fields, "id");
    let url = if id == PLACEHOLDER {
        PLACEHOLDER.to_string()
    } else {
        format!("{STATUS_BASE}/{id}")
    };
    let text = text_field(fields, "text");

    NormalizedRecord::new(Source::SocialB, collected_at)
        .with_tags(hashtags(&text))
        .with_external_id(id)
        .with_text(text)
        .with_url(url)
        .with_extra("data_type", "tweet")
        .with_extra("source_query", query)
        .with_extra("author_id", optional_text(fields, "author_id"))
        .with_extra("language", optional_text(fields, "lang"))
        .with_extra("created_at_iso", optional_text(fields, "created_at"))
        .with_extra("public_metrics", value_or_null(fields, "public_metrics"))
        .with_extra("geo", value_or_null(fields, "geo"))
}

/// Hashtags in order of appearance, without the leading `#`.
pub fn hashtags(text: &str) -> Vec<String> {
    HASHTAG
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}
