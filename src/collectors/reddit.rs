// src/collectors/reddit.rs

//! Reddit collector.
//!
//! Authenticates with an application-only OAuth token, then reads the
//! newest submissions of each configured subreddit followed by keyword
//! searches across all of them. Search results already seen in this pass
//! are dropped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{Map, Value};

use super::Collector;
use crate::error::{AppError, Result};
use crate::events::{CollectorEvent, EventSink};
use crate::models::{NormalizedRecord, PLACEHOLDER, RedditConfig, Source};
use crate::normalize::{Collection, RecordSet, json_kind, optional_text, text_field, value_or_null};
use crate::utils::http;

pub const CLIENT_ID_ENV: &str = "REDDIT_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "REDDIT_CLIENT_SECRET";
pub const USER_AGENT_ENV: &str = "REDDIT_USER_AGENT";

const PERMALINK_BASE: &str = "https://www.reddit.com";
const DELETED_AUTHOR: &str = "[deleted]";

/// How a submission was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    SubredditNew,
    Search,
}

impl Discovery {
    fn as_str(&self) -> &'static str {
        match self {
            Discovery::SubredditNew => "subreddit_new",
            Discovery::Search => "search",
        }
    }
}

/// Application credentials for the Reddit API.
pub struct RedditAuth {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

pub struct RedditCollector {
    client: Client,
    config: RedditConfig,
    auth: RedditAuth,
}

impl RedditCollector {
    pub fn new(client: Client, config: RedditConfig, auth: RedditAuth) -> Self {
        Self {
            client,
            config,
            auth,
        }
    }

    /// Exchange the client credentials for a read-only bearer token.
    async fn access_token(&self) -> Result<String> {
        let request = self
            .client
            .post(&self.config.auth_url)
            .basic_auth(&self.auth.client_id, Some(&self.auth.client_secret))
            .header(reqwest::header::USER_AGENT, &self.auth.user_agent)
            .form(&[("grant_type", "client_credentials")]);
        let body = http::fetch_json(request, "social-a authentication").await?;

        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::structure(
                    "social-a authentication",
                    format!("no access_token in response ({})", json_kind(&body)),
                )
            })
    }

    async fn listing(&self, token: &str, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.config.api_base.trim_end_matches('/'), path);
        let request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.auth.user_agent)
            .query(query);
        http::fetch_json(request, &url).await
    }
}

#[async_trait]
impl Collector for RedditCollector {
    fn source(&self) -> Source {
        Source::SocialA
    }

    async fn collect(&self, events: &dyn EventSink) -> Result<Collection> {
        let source = self.source();
        events.emit(CollectorEvent::Diagnostic {
            source,
            message: format!("Authenticating read-only as '{}'", self.auth.user_agent),
        });
        let token = self.access_token().await?;

        let limit = self.config.limit_per_source.to_string();
        let mut set = RecordSet::new(source, events);

        for subreddit in &self.config.subreddits {
            events.emit(CollectorEvent::Fetching {
                source,
                target: format!("r/{subreddit} (new, limit {limit})"),
            });
            let payload = self
                .listing(
                    &token,
                    &format!("/r/{subreddit}/new"),
                    &[("limit", limit.clone()), ("raw_json", "1".to_string())],
                )
                .await?;
            let added = absorb_listing(
                &payload,
                Discovery::SubredditNew,
                subreddit,
                Utc::now(),
                &mut set,
            );
            events.emit(CollectorEvent::Progress {
                source,
                scope: format!("r/{subreddit}"),
                count: added,
            });
            pause(self.config.subreddit_pause_ms).await;
        }

        let scope = self.config.subreddits.join("+");
        for keyword in &self.config.keywords {
            events.emit(CollectorEvent::Fetching {
                source,
                target: format!("search '{keyword}' in r/{scope}"),
            });
            let payload = self
                .listing(
                    &token,
                    &format!("/r/{scope}/search"),
                    &[
                        ("q", keyword.clone()),
                        ("sort", "new".to_string()),
                        ("t", "all".to_string()),
                        ("restrict_sr", "true".to_string()),
                        ("limit", limit.clone()),
                        ("raw_json", "1".to_string()),
                    ],
                )
                .await?;
            let added = absorb_listing(&payload, Discovery::Search, keyword, Utc::now(), &mut set);
            events.emit(CollectorEvent::Progress {
                source,
                scope: format!("new posts for keyword '{keyword}'"),
                count: added,
            });
            pause(self.config.search_pause_ms).await;
        }

        Ok(set.finish())
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Normalize every submission of a listing into `set`.
///
/// Search results are deduplicated against what the pass already holds.
/// Returns the number of records added.
pub fn absorb_listing(
    payload: &Value,
    discovery: Discovery,
    query: &str,
    collected_at: DateTime<Utc>,
    set: &mut RecordSet<'_>,
) -> usize {
    let Some(children) = payload
        .get("data")
        .and_then(|data| data.get("children"))
        .and_then(Value::as_array)
    else {
        set.unrecognized(format!(
            "listing for '{query}' has no data.children ({})",
            json_kind(payload)
        ));
        return 0;
    };

    let mut added = 0;
    for child in children {
        let Some(fields) = child.get("data").and_then(Value::as_object) else {
            set.skip(format!("listing child is a {}", json_kind(child)));
            continue;
        };
        let record = normalize_submission(fields, discovery, query, collected_at);
        match discovery {
            Discovery::SubredditNew => {
                set.push(record);
                added += 1;
            }
            Discovery::Search => {
                if set.push_unique(record) {
                    added += 1;
                }
            }
        }
    }
    added
}

/// Map one submission onto a record; never fails.
pub fn normalize_submission(
    fields: &Map<String, Value>,
    discovery: Discovery,
    query: &str,
    collected_at: DateTime<Utc>,
) -> NormalizedRecord {
    let subreddit = match (discovery, fields.get("subreddit").and_then(Value::as_str)) {
        (_, Some(name)) => name.to_string(),
        (Discovery::SubredditNew, None) => query.to_string(),
        (Discovery::Search, None) => PLACEHOLDER.to_string(),
    };
    let url = fields
        .get("permalink")
        .and_then(Value::as_str)
        .map(|permalink| format!("{PERMALINK_BASE}{permalink}"))
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let author = fields
        .get("author")
        .and_then(Value::as_str)
        .unwrap_or(DELETED_AUTHOR)
        .to_string();
    let created = fields
        .get("created_utc")
        .and_then(Value::as_f64)
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        .map(|at| Value::String(at.to_rfc3339()))
        .unwrap_or(Value::Null);
    let body = match fields.get("selftext") {
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    };

    NormalizedRecord::new(Source::SocialA, collected_at)
        .with_external_id(text_field(fields, "id"))
        .with_text(text_field(fields, "title"))
        .with_url(url)
        .with_tags(vec![subreddit.clone()])
        .with_extra("data_type", "submission")
        .with_extra("source_method", discovery.as_str())
        .with_extra("source_query", query)
        .with_extra("text", body)
        .with_extra("author", author)
        .with_extra("subreddit", subreddit)
        .with_extra("score", value_or_null(fields, "score"))
        .with_extra("upvote_ratio", value_or_null(fields, "upvote_ratio"))
        .with_extra("num_comments", value_or_null(fields, "num_comments"))
        .with_extra("created_utc_iso", created)
        .with_extra("link_flair", optional_text(fields, "link_flair_text"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use serde_json::json;

    fn listing(posts: Value) -> Value {
        json!({"kind": "Listing", "data": {"children": posts}})
    }

    fn post(id: &str, title: &str) -> Value {
        json!({
            "kind": "t3",
            "data": {
                "id": id,
                "title": title,
                "selftext": "body",
                "author": "alice",
                "subreddit": "ethereum",
                "score": 12,
                "upvote_ratio": 0.93,
                "num_comments": 4,
                "permalink": format!("/r/ethereum/comments/{id}/slug/"),
                "created_utc": 1714000000.0
            }
        })
    }

    #[test]
    fn subreddit_listing_maps_submissions() {
        let sink = MemorySink::new();
        let now = Utc::now();
        let mut set = RecordSet::new(Source::SocialA, &sink);

        let added = absorb_listing(
            &listing(json!([post("a1", "Hiring Solidity devs")])),
            Discovery::SubredditNew,
            "ethereum",
            now,
            &mut set,
        );
        assert_eq!(added, 1);

        let collection = set.finish();
        let record = &collection.records[0];
        assert_eq!(record.external_id, "a1");
        assert_eq!(record.primary_text, "Hiring Solidity devs");
        assert_eq!(record.url, "https://www.reddit.com/r/ethereum/comments/a1/slug/");
        assert_eq!(record.tags, vec!["ethereum"]);
        assert_eq!(record.extra["source_method"], json!("subreddit_new"));
        assert_eq!(record.extra["score"], json!(12));
        assert_eq!(record.extra["created_utc_iso"], json!("2024-04-24T23:06:40+00:00"));
    }

    #[test]
    fn overlapping_search_results_are_kept_once() {
        let sink = MemorySink::new();
        let now = Utc::now();
        let mut set = RecordSet::new(Source::SocialA, &sink);

        absorb_listing(
            &listing(json!([post("a1", "first")])),
            Discovery::SubredditNew,
            "ethereum",
            now,
            &mut set,
        );
        let first = absorb_listing(
            &listing(json!([post("a1", "first"), post("b2", "second")])),
            Discovery::Search,
            "web3 developer salary",
            now,
            &mut set,
        );
        let second = absorb_listing(
            &listing(json!([post("b2", "second")])),
            Discovery::Search,
            "remote web3 role",
            now,
            &mut set,
        );

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        let ids: Vec<String> = set.finish().records.into_iter().map(|r| r.external_id).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
    }

    #[test]
    fn deleted_author_and_missing_fields_use_placeholders() {
        let fields = json!({"id": "z9"});
        let record = normalize_submission(
            fields.as_object().unwrap(),
            Discovery::Search,
            "Coinbase hiring",
            Utc::now(),
        );
        assert_eq!(record.primary_text, PLACEHOLDER);
        assert_eq!(record.url, PLACEHOLDER);
        assert_eq!(record.extra["author"], json!(DELETED_AUTHOR));
        assert_eq!(record.extra["text"], json!(""));
        assert_eq!(record.extra["score"], Value::Null);
        assert_eq!(record.extra["subreddit"], json!(PLACEHOLDER));
    }

    #[test]
    fn malformed_children_are_skipped() {
        let sink = MemorySink::new();
        let mut set = RecordSet::new(Source::SocialA, &sink);
        let added = absorb_listing(
            &listing(json!(["oops", {"kind": "t3"}, post("c3", "ok")])),
            Discovery::SubredditNew,
            "web3",
            Utc::now(),
            &mut set,
        );
        assert_eq!(added, 1);
        assert_eq!(set.skipped(), 2);
    }

    #[test]
    fn listing_without_children_is_an_unrecognized_shape() {
        let sink = MemorySink::quiet();
        let mut set = RecordSet::new(Source::SocialA, &sink);
        let added = absorb_listing(
            &json!({"error": 403}),
            Discovery::SubredditNew,
            "web3",
            Utc::now(),
            &mut set,
        );
        assert_eq!(added, 0);
        assert!(set.is_empty());
        assert_eq!(set.skipped(), 0);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            CollectorEvent::ShapeUnrecognized { source: Source::SocialA, detail }
                if detail.contains("data.children")
        )));
        assert!(!sink
            .events()
            .iter()
            .any(|e| matches!(e, CollectorEvent::ItemSkipped { .. })));
    }
}
