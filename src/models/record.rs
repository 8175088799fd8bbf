//! The common record shape every collector produces.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Explicit stand-in for a text field the source did not provide.
pub const PLACEHOLDER: &str = "N/A";

/// Origin system of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Job-board REST API (Web3.Career)
    #[serde(rename = "job-api")]
    JobApi,
    /// Job-board HTML listing (CryptoJobsList)
    #[serde(rename = "job-scrape")]
    JobScrape,
    /// Reddit
    #[serde(rename = "social-a")]
    SocialA,
    /// Twitter
    #[serde(rename = "social-b")]
    SocialB,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::JobApi,
        Source::JobScrape,
        Source::SocialA,
        Source::SocialB,
    ];

    /// Stable tag used in config, CLI arguments and stored records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::JobApi => "job-api",
            Source::JobScrape => "job-scrape",
            Source::SocialA => "social-a",
            Source::SocialB => "social-b",
        }
    }

    /// Human-readable name of the external system.
    pub fn system(&self) -> &'static str {
        match self {
            Source::JobApi => "Web3.Career",
            Source::JobScrape => "CryptoJobsList",
            Source::SocialA => "Reddit",
            Source::SocialB => "Twitter",
        }
    }

    /// Environment variables the collector needs before it may fetch.
    pub fn required_env(&self) -> &'static [&'static str] {
        match self {
            Source::JobApi => &["WEB3_CAREER_API_KEY"],
            Source::JobScrape => &[],
            Source::SocialA => &[
                "REDDIT_CLIENT_ID",
                "REDDIT_CLIENT_SECRET",
                "REDDIT_USER_AGENT",
            ],
            Source::SocialB => &["TWITTER_BEARER_TOKEN"],
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| AppError::config(format!("Unknown collector '{s}'")))
    }
}

/// A normalized item from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source: Source,

    /// Identifier unique within `source`, or [`PLACEHOLDER`]
    pub external_id: String,

    /// Title or body text; may be empty
    pub primary_text: String,

    /// Absolute link back to the origin item, or [`PLACEHOLDER`]
    pub url: String,

    /// Source order, duplicates allowed
    #[serde(default)]
    pub tags: Vec<String>,

    pub collected_at: DateTime<Utc>,

    /// Source-specific fields
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl NormalizedRecord {
    /// Start a record stamped with the given collection time.
    ///
    /// Identifier and URL begin as placeholders until the normalizer
    /// fills them in.
    pub fn new(source: Source, collected_at: DateTime<Utc>) -> Self {
        Self {
            source,
            external_id: PLACEHOLDER.to_string(),
            primary_text: String::new(),
            url: PLACEHOLDER.to_string(),
            tags: Vec::new(),
            collected_at,
            extra: Map::new(),
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = id.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.primary_text = text.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Add one source-specific field.
    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn has_external_id(&self) -> bool {
        self.external_id != PLACEHOLDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_tag() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
        }
        assert!("social-c".parse::<Source>().is_err());
    }

    #[test]
    fn new_record_uses_placeholders() {
        let now = Utc::now();
        let record = NormalizedRecord::new(Source::JobScrape, now);
        assert_eq!(record.external_id, PLACEHOLDER);
        assert_eq!(record.url, PLACEHOLDER);
        assert!(record.tags.is_empty());
        assert_eq!(record.collected_at, now);
        assert!(!record.has_external_id());
    }

    #[test]
    fn serializes_source_as_tag() {
        let record = NormalizedRecord::new(Source::SocialB, Utc::now())
            .with_external_id("17")
            .with_extra("language", "en");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "social-b");
        assert_eq!(json["external_id"], "17");
        assert_eq!(json["extra"]["language"], "en");
    }
}
