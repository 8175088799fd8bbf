//! Source collectors and the single-collector driver.
//!
//! Each collector fetches one external system and normalizes what it finds
//! into [`NormalizedRecord`](crate::models::NormalizedRecord)s. The driver
//! resolves credentials up front, opens the store, runs the collector and
//! reports through the event stream.

pub mod cryptojobslist;
pub mod reddit;
pub mod twitter;
pub mod web3career;

use async_trait::async_trait;

use crate::credentials::Credentials;
use crate::error::{AppError, Result};
use crate::events::{CollectorEvent, EventSink};
use crate::models::{Config, Source};
use crate::storage::{self, RecordStore};
use crate::utils::http;

pub use crate::normalize::Collection;
pub use cryptojobslist::CryptoJobsListCollector;
pub use reddit::{RedditAuth, RedditCollector};
pub use twitter::TwitterCollector;
pub use web3career::Web3CareerCollector;

/// One external source.
#[async_trait]
pub trait Collector: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch and normalize everything this source offers in one pass.
    async fn collect(&self, events: &dyn EventSink) -> Result<Collection>;
}

/// Every environment variable a collector run needs, store included.
pub fn required_credentials(source: Source, config: &Config) -> Vec<String> {
    let mut names: Vec<String> = source
        .required_env()
        .iter()
        .map(|name| name.to_string())
        .collect();
    names.extend(storage::required_env(&config.store));
    names
}

/// Construct the collector for `source` from resolved credentials.
pub fn build_collector(
    source: Source,
    config: &Config,
    credentials: &Credentials,
) -> Result<Box<dyn Collector>> {
    let collector: Box<dyn Collector> = match source {
        Source::JobApi => Box::new(Web3CareerCollector::new(
            http::create_client(&config.http)?,
            config.web3career.clone(),
            credentials.get(web3career::TOKEN_ENV)?,
        )),
        Source::JobScrape => Box::new(CryptoJobsListCollector::new(
            http::create_client_with_agent(&config.http, &config.cryptojobslist.user_agent)?,
            config.cryptojobslist.clone(),
        )),
        Source::SocialA => {
            let auth = RedditAuth {
                client_id: credentials.get(reddit::CLIENT_ID_ENV)?.to_string(),
                client_secret: credentials.get(reddit::CLIENT_SECRET_ENV)?.to_string(),
                user_agent: credentials.get(reddit::USER_AGENT_ENV)?.to_string(),
            };
            Box::new(RedditCollector::new(
                http::create_client_with_agent(&config.http, &auth.user_agent)?,
                config.reddit.clone(),
                auth,
            ))
        }
        Source::SocialB => Box::new(TwitterCollector::new(
            http::create_client(&config.http)?,
            config.twitter.clone(),
            credentials.get(twitter::TOKEN_ENV)?,
        )),
    };
    Ok(collector)
}

/// Run one collector end to end.
///
/// Credentials and the store are checked before any fetch. Returns the
/// number of records collected; every failure is also reported as a
/// [`CollectorEvent::CollectorFailed`].
pub async fn run_collector(
    source: Source,
    config: &Config,
    events: &dyn EventSink,
) -> Result<usize> {
    events.emit(CollectorEvent::CollectorStarted { source });

    let result = prepare_and_run(source, config, events).await;
    if let Err(e) = &result {
        report_failure(source, e, events);
    }
    result
}

async fn prepare_and_run(
    source: Source,
    config: &Config,
    events: &dyn EventSink,
) -> Result<usize> {
    let names = required_credentials(source, config);
    let credentials = Credentials::from_env(source.as_str(), &names)?;
    log::debug!("Resolved credentials for {}: {:?}", source, credentials);

    let store = storage::open(&config.store, &credentials).await?;
    if let Some(store) = &store {
        store.verify().await?;
    }

    let collector = build_collector(source, config, &credentials)?;
    run_with(
        collector.as_ref(),
        store.as_deref(),
        config.preview_count(source),
        events,
    )
    .await
}

/// Collect, preview and store.
pub async fn run_with(
    collector: &dyn Collector,
    store: Option<&dyn RecordStore>,
    preview_count: usize,
    events: &dyn EventSink,
) -> Result<usize> {
    let source = collector.source();
    let collection = collector.collect(events).await?;

    if collection.records.is_empty() {
        events.emit(CollectorEvent::Diagnostic {
            source,
            message: "No records collected".to_string(),
        });
    }
    for (index, record) in collection.records.iter().take(preview_count).enumerate() {
        events.emit(CollectorEvent::Preview {
            source,
            index,
            record: Box::new(record.clone()),
        });
    }

    if let Some(store) = store {
        let count = store.insert(&collection.records).await?;
        events.emit(CollectorEvent::RecordsStored {
            source,
            count,
            destination: store.destination(),
        });
    }

    events.emit(CollectorEvent::CollectorFinished {
        source,
        count: collection.records.len(),
        skipped: collection.skipped,
    });
    Ok(collection.records.len())
}

fn report_failure(source: Source, error: &AppError, events: &dyn EventSink) {
    events.emit(CollectorEvent::CollectorFailed {
        source,
        kind: error.kind(),
        message: error.to_string(),
    });
    if error.is_auth_failure() {
        events.emit(CollectorEvent::Diagnostic {
            source,
            message: format!(
                "Authentication rejected; check {}",
                source.required_env().join(", ")
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::MemorySink;
    use crate::models::{NormalizedRecord, StoreConfig, StoreKind};
    use chrono::Utc;
    use std::sync::Mutex;

    struct FixedCollector {
        records: usize,
        skipped: usize,
        fail: bool,
    }

    #[async_trait]
    impl Collector for FixedCollector {
        fn source(&self) -> Source {
            Source::JobApi
        }

        async fn collect(&self, _events: &dyn EventSink) -> Result<Collection> {
            if self.fail {
                return Err(AppError::HttpStatus {
                    context: "job-api".to_string(),
                    status: 401,
                    snippet: "bad token".to_string(),
                });
            }
            let records = (0..self.records)
                .map(|i| {
                    NormalizedRecord::new(Source::JobApi, Utc::now()).with_external_id(i.to_string())
                })
                .collect();
            Ok(Collection {
                records,
                skipped: self.skipped,
            })
        }
    }

    #[derive(Default)]
    struct VecStore {
        inserted: Mutex<Vec<NormalizedRecord>>,
    }

    #[async_trait]
    impl RecordStore for VecStore {
        fn destination(&self) -> String {
            "memory".to_string()
        }

        async fn verify(&self) -> Result<()> {
            Ok(())
        }

        async fn insert(&self, records: &[NormalizedRecord]) -> Result<usize> {
            let mut inserted = self.inserted.lock().unwrap();
            inserted.extend_from_slice(records);
            Ok(records.len())
        }
    }

    #[tokio::test]
    async fn run_with_previews_stores_and_finishes() {
        let sink = MemorySink::new();
        let store = VecStore::default();
        let collector = FixedCollector {
            records: 5,
            skipped: 2,
            fail: false,
        };

        let count = run_with(&collector, Some(&store), 3, &sink).await.unwrap();

        assert_eq!(count, 5);
        assert_eq!(store.inserted.lock().unwrap().len(), 5);
        let events = sink.events();
        let previews = events
            .iter()
            .filter(|e| matches!(e, CollectorEvent::Preview { .. }))
            .count();
        assert_eq!(previews, 3);
        assert!(matches!(
            events.last(),
            Some(CollectorEvent::CollectorFinished { count: 5, skipped: 2, .. })
        ));
    }

    #[tokio::test]
    async fn empty_collection_is_not_a_failure() {
        let sink = MemorySink::new();
        let collector = FixedCollector {
            records: 0,
            skipped: 0,
            fail: false,
        };
        assert_eq!(run_with(&collector, None, 3, &sink).await.unwrap(), 0);
        assert!(sink.render().contains("No records collected"));
    }

    #[tokio::test]
    async fn collector_error_propagates_without_storing() {
        let sink = MemorySink::new();
        let store = VecStore::default();
        let collector = FixedCollector {
            records: 0,
            skipped: 0,
            fail: true,
        };
        let err = run_with(&collector, Some(&store), 3, &sink).await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_fetching() {
        let sink = MemorySink::new();
        let config = Config {
            store: StoreConfig {
                kind: StoreKind::Postgres,
                uri_env: "HARVESTER_TEST_UNSET_STORE_URI".to_string(),
                ..StoreConfig::default()
            },
            ..Config::default()
        };

        let err = run_collector(Source::JobScrape, &config, &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingCredential { .. }));
        let events = sink.events();
        assert!(matches!(events[0], CollectorEvent::CollectorStarted { .. }));
        assert!(events.iter().any(|e| matches!(
            e,
            CollectorEvent::CollectorFailed { kind: ErrorKind::Configuration, .. }
        )));
        assert!(!events.iter().any(|e| matches!(e, CollectorEvent::Fetching { .. })));
    }

    #[test]
    fn credentials_include_store_uri() {
        let mut config = Config::default();
        assert_eq!(
            required_credentials(Source::SocialB, &config),
            vec!["TWITTER_BEARER_TOKEN"]
        );
        config.store.kind = StoreKind::Postgres;
        assert_eq!(
            required_credentials(Source::JobScrape, &config),
            vec!["POSTGRES_URI"]
        );
    }

    #[test]
    fn scraper_builds_without_credentials() {
        let config = Config::default();
        let none = Credentials::default();
        let collector = build_collector(Source::JobScrape, &config, &none).unwrap();
        assert_eq!(collector.source(), Source::JobScrape);
        assert!(build_collector(Source::JobApi, &config, &none).is_err());
    }
}
