// src/collectors/web3career.rs

//! Job-board API collector (Web3.Career).
//!
//! One GET with the token and filters as query parameters. The response
//! envelope is not documented reliably, so items are located through
//! [`PayloadShape`] and an unrecognized shape degrades to an empty result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{Map, Value};

use super::Collector;
use crate::credentials::redact;
use crate::error::Result;
use crate::events::{CollectorEvent, EventSink};
use crate::models::{NormalizedRecord, Source, Web3CareerConfig};
use crate::normalize::{
    Collection, PayloadShape, RecordSet, json_kind, optional_text, string_list, text_field,
    value_or_null,
};
use crate::utils::{get_domain, http};

pub const TOKEN_ENV: &str = "WEB3_CAREER_API_KEY";

pub struct Web3CareerCollector {
    client: Client,
    config: Web3CareerConfig,
    token: String,
}

impl Web3CareerCollector {
    pub fn new(client: Client, config: Web3CareerConfig, token: impl Into<String>) -> Self {
        Self {
            client,
            config,
            token: token.into(),
        }
    }

    /// Query parameters without the token.
    fn filter_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.config.limit.to_string()),
            ("show_description", self.config.show_description.to_string()),
        ];
        if let Some(remote) = self.config.remote {
            params.push(("remote", remote.to_string()));
        }
        if let Some(country) = &self.config.country {
            params.push(("country", country.clone()));
        }
        if let Some(tag) = &self.config.tag {
            params.push(("tag", tag.clone()));
        }
        params
    }
}

#[async_trait]
impl Collector for Web3CareerCollector {
    fn source(&self) -> Source {
        Source::JobApi
    }

    async fn collect(&self, events: &dyn EventSink) -> Result<Collection> {
        let source = self.source();
        events.emit(CollectorEvent::Diagnostic {
            source,
            message: format!("API key loaded (starts with: {})", redact(&self.token)),
        });

        let filters = self.filter_params();
        let printable: Vec<String> = filters.iter().map(|(k, v)| format!("{k}={v}")).collect();
        events.emit(CollectorEvent::Fetching {
            source,
            target: format!(
                "{} ({}) with [{}]",
                self.config.endpoint,
                get_domain(&self.config.endpoint).unwrap_or_default(),
                printable.join(", ")
            ),
        });

        let mut params = filters;
        params.push(("token", self.token.clone()));
        let request = self.client.get(&self.config.endpoint).query(&params);
        let payload = http::fetch_json(request, source.as_str()).await?;

        Ok(normalize_payload(
            &payload,
            &self.config.item_keys,
            Utc::now(),
            events,
        ))
    }
}

/// Locate job items in `payload` and normalize each one.
pub fn normalize_payload(
    payload: &Value,
    item_keys: &[String],
    collected_at: DateTime<Utc>,
    events: &dyn EventSink,
) -> Collection {
    let source = Source::JobApi;
    let shape = PayloadShape::decode(payload);

    let items = match shape.locate_items(item_keys) {
        Ok(items) => {
            events.emit(CollectorEvent::ShapeDetected {
                source,
                detail: format!("{} with {} items", shape.describe(), items.len()),
            });
            items
        }
        Err(detail) => {
            events.emit(CollectorEvent::ShapeUnrecognized { source, detail });
            return Collection::default();
        }
    };

    let mut set = RecordSet::new(source, events);
    for item in items {
        match item.as_object() {
            Some(fields) => set.push(normalize_job(fields, collected_at, events)),
            None => set.skip(format!("expected a job mapping, found {}", json_kind(item))),
        }
    }
    set.finish()
}

/// Map one job object onto a record; never fails.
pub fn normalize_job(
    fields: &Map<String, Value>,
    collected_at: DateTime<Utc>,
    events: &dyn EventSink,
) -> NormalizedRecord {
    let external_id = text_field(fields, "id");

    let tags = string_list(fields, "tags").unwrap_or_else(|| {
        events.emit(CollectorEvent::Diagnostic {
            source: Source::JobApi,
            message: format!(
                "Tags for job {} are not a list: {}",
                external_id,
                value_or_null(fields, "tags")
            ),
        });
        Vec::new()
    });

    NormalizedRecord::new(Source::JobApi, collected_at)
        .with_external_id(external_id)
        .with_text(text_field(fields, "title"))
        .with_url(text_field(fields, "apply_url"))
        .with_tags(tags)
        .with_extra("company", optional_text(fields, "company"))
        .with_extra("location", optional_text(fields, "location"))
        .with_extra("country", optional_text(fields, "country"))
        .with_extra("city", optional_text(fields, "city"))
        .with_extra("description", optional_text(fields, "description"))
        .with_extra("date_posted_epoch", value_or_null(fields, "date_epoch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::models::PLACEHOLDER;
    use serde_json::json;

    fn keys() -> Vec<String> {
        Web3CareerConfig::default().item_keys
    }

    #[test]
    fn jobs_mapping_yields_one_record() {
        let sink = MemorySink::new();
        let now = Utc::now();
        let payload = json!({"jobs": [{"id": "42", "title": "Dev"}]});

        let collection = normalize_payload(&payload, &keys(), now, &sink);

        assert_eq!(collection.records.len(), 1);
        assert_eq!(collection.skipped, 0);
        let record = &collection.records[0];
        assert_eq!(record.source, Source::JobApi);
        assert_eq!(record.external_id, "42");
        assert_eq!(record.primary_text, "Dev");
        assert!(record.tags.is_empty());
        assert_eq!(record.collected_at, now);
        assert_eq!(record.url, PLACEHOLDER);
    }

    #[test]
    fn bare_sequence_yields_nothing_with_diagnostic() {
        let sink = MemorySink::new();
        let payload = json!([{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]);

        let collection = normalize_payload(&payload, &keys(), Utc::now(), &sink);

        assert!(collection.records.is_empty());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, CollectorEvent::ShapeUnrecognized { .. })));
    }

    #[test]
    fn envelope_sequence_is_searched_for_item_list() {
        let sink = MemorySink::new();
        let payload = json!([
            "meta",
            {"count": 2},
            [{"id": 1, "title": "Rust Engineer", "tags": ["rust", "defi"]}, "advert"]
        ]);

        let collection = normalize_payload(&payload, &keys(), Utc::now(), &sink);

        assert_eq!(collection.records.len(), 1);
        assert_eq!(collection.skipped, 1);
        assert_eq!(collection.records[0].external_id, "1");
        assert_eq!(collection.records[0].tags, vec!["rust", "defi"]);
    }

    #[test]
    fn sparse_job_is_parsed_with_placeholders() {
        let sink = MemorySink::new();
        let job = json!({"company": "Acme", "tags": "solidity"});

        let record = normalize_job(job.as_object().unwrap(), Utc::now(), &sink);

        assert_eq!(record.external_id, PLACEHOLDER);
        assert_eq!(record.primary_text, PLACEHOLDER);
        assert!(record.tags.is_empty());
        assert_eq!(record.extra["company"], json!("Acme"));
        assert_eq!(record.extra["city"], Value::Null);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, CollectorEvent::Diagnostic { message, .. } if message.contains("not a list"))));
    }

    #[test]
    fn full_job_maps_every_field() {
        let sink = MemorySink::new();
        let job = json!({
            "id": 981,
            "title": "Smart Contract Auditor",
            "company": "Chainsafe",
            "location": "Remote",
            "country": "Canada",
            "city": "Toronto",
            "apply_url": "https://web3.career/smart-contract-auditor/981",
            "tags": ["audit", "solidity"],
            "description": "<p>Audit things</p>",
            "date_epoch": 1714000000
        });

        let record = normalize_job(job.as_object().unwrap(), Utc::now(), &sink);

        assert_eq!(record.external_id, "981");
        assert_eq!(record.url, "https://web3.career/smart-contract-auditor/981");
        assert_eq!(record.extra["date_posted_epoch"], json!(1714000000));
        assert_eq!(record.extra["country"], json!("Canada"));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn token_is_not_part_of_printable_filters() {
        let collector = Web3CareerCollector::new(
            Client::new(),
            Web3CareerConfig {
                tag: Some("rust".to_string()),
                ..Web3CareerConfig::default()
            },
            "secret-token",
        );
        let params = collector.filter_params();
        assert!(params.iter().all(|(k, _)| *k != "token"));
        assert!(params.contains(&("tag", "rust".to_string())));
        assert!(params.contains(&("limit", "100".to_string())));
    }
}
