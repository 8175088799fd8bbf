// src/collectors/cryptojobslist.rs

//! Job-board HTML scraper (CryptoJobsList).
//!
//! Fetches the listing page once and reads each job row of the inline
//! job table through configurable CSS selectors.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::Collector;
use crate::error::{AppError, Result};
use crate::events::{CollectorEvent, EventSink};
use crate::models::{CryptoJobsListConfig, ListingSelectors, NormalizedRecord, PLACEHOLDER, Source};
use crate::normalize::{Collection, RecordSet};
use crate::utils::{extract_listing_id, http, resolve_url};

static LOCATION_PIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*📍\s*").expect("static pattern"));

const IMPLIED_REMOTE: &str = "Remote (Implied)";

pub struct CryptoJobsListCollector {
    client: Client,
    config: CryptoJobsListConfig,
}

impl CryptoJobsListCollector {
    pub fn new(client: Client, config: CryptoJobsListConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Collector for CryptoJobsListCollector {
    fn source(&self) -> Source {
        Source::JobScrape
    }

    async fn collect(&self, events: &dyn EventSink) -> Result<Collection> {
        events.emit(CollectorEvent::Fetching {
            source: self.source(),
            target: self.config.url.clone(),
        });

        let fetched = http::fetch_page(&self.client, &self.config.url).await;
        let result = fetched.and_then(|body| {
            let base = Url::parse(&self.config.url)?;
            parse_listing(&body, &base, &self.config.selectors, Utc::now(), events)
        });

        let delay = Duration::from_secs(self.config.politeness_delay_secs);
        if !delay.is_zero() {
            log::info!("Pausing for {} seconds before finishing...", delay.as_secs());
            tokio::time::sleep(delay).await;
        }

        result
    }
}

/// Compiled listing selectors.
struct Selectors {
    table_body: Selector,
    row: Selector,
    title: Selector,
    company: Selector,
    tags: Selector,
    tags_cell: Selector,
    salary: Selector,
    salary_marker: Selector,
    location: Selector,
    cell: Selector,
}

impl Selectors {
    fn compile(config: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            table_body: parse_selector(&config.table_body)?,
            row: parse_selector(&config.row)?,
            title: parse_selector(&config.title)?,
            company: parse_selector(&config.company)?,
            tags: parse_selector(&config.tags)?,
            tags_cell: parse_selector(&config.tags_cell)?,
            salary: parse_selector(&config.salary)?,
            salary_marker: parse_selector(&config.salary_marker)?,
            location: parse_selector(&config.location)?,
            cell: parse_selector("td")?,
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Text content with each fragment trimmed, fragments concatenated.
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

/// Parse a listing page into records.
///
/// A missing job table or an empty row set is a structural failure: the
/// page layout changed and at least one job row is always expected.
pub fn parse_listing(
    body: &str,
    base: &Url,
    config: &ListingSelectors,
    collected_at: DateTime<Utc>,
    events: &dyn EventSink,
) -> Result<Collection> {
    let source = Source::JobScrape;
    let selectors = Selectors::compile(config)?;
    let document = Html::parse_document(body);

    let table_body = document.select(&selectors.table_body).next().ok_or_else(|| {
        AppError::structure(
            source.as_str(),
            format!("could not find table body using selector '{}'", config.table_body),
        )
    })?;

    let rows: Vec<ElementRef> = table_body.select(&selectors.row).collect();
    if rows.is_empty() {
        return Err(AppError::structure(
            source.as_str(),
            format!("no job rows found using selector '{}'", config.row),
        ));
    }
    events.emit(CollectorEvent::ShapeDetected {
        source,
        detail: format!("{} potential job rows", rows.len()),
    });

    let mut set = RecordSet::new(source, events);
    for (index, row) in rows.iter().enumerate() {
        if row.value().classes().any(|class| class == config.ad_row_class) {
            log::debug!("Row {} is an advert, ignoring", index);
            continue;
        }
        match parse_row(row, base, &selectors, collected_at) {
            Some(record) => set.push(record),
            None => set.skip(format!("row {index} has no linked title")),
        }
    }
    Ok(set.finish())
}

fn parse_row(
    row: &ElementRef,
    base: &Url,
    selectors: &Selectors,
    collected_at: DateTime<Utc>,
) -> Option<NormalizedRecord> {
    // An anchor with blank text still identifies a listing.
    let title_elem = row.select(&selectors.title).next()?;
    let title = element_text(&title_elem);
    let href = title_elem.value().attr("href")?;
    let url = resolve_url(base, href);

    let company = row
        .select(&selectors.company)
        .next()
        .map(|e| element_text(&e))
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let tags: Vec<String> = row
        .select(&selectors.tags)
        .map(|e| element_text(&e))
        .collect();
    let salary = extract_salary(row, selectors);
    let location = extract_location(row, selectors, &salary, &tags);
    let external_id = extract_listing_id(&url).unwrap_or_else(|| PLACEHOLDER.to_string());

    Some(
        NormalizedRecord::new(Source::JobScrape, collected_at)
            .with_external_id(external_id)
            .with_text(title)
            .with_url(url)
            .with_tags(tags)
            .with_extra("company", company)
            .with_extra("location", location)
            .with_extra("salary_range", salary),
    )
}

/// Salary text, recognised by the currency icon next to it.
fn extract_salary(row: &ElementRef, selectors: &Selectors) -> String {
    row.select(&selectors.salary)
        .next()
        .filter(|span| {
            span.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "div")
                .is_some_and(|div| div.select(&selectors.salary_marker).next().is_some())
        })
        .map(|span| element_text(&span))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn extract_location(
    row: &ElementRef,
    selectors: &Selectors,
    salary: &str,
    tags: &[String],
) -> String {
    let differs_from_salary = |text: &str| salary == PLACEHOLDER || salary != text;

    let cell = match row.select(&selectors.tags_cell).next() {
        Some(tags_cell) => tags_cell
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "td"),
        None => row.select(&selectors.cell).nth(4),
    };

    let mut location = PLACEHOLDER.to_string();
    if let Some(cell) = cell {
        if let Some(span) = cell.select(&selectors.location).next() {
            let raw = element_text(&span);
            if differs_from_salary(&raw) {
                let cleaned = LOCATION_PIN.replace(&raw, "").trim().to_string();
                location = if cleaned.is_empty() {
                    IMPLIED_REMOTE.to_string()
                } else {
                    cleaned
                };
            }
        } else {
            let raw = element_text(&cell);
            if !raw.is_empty() && differs_from_salary(&raw) {
                location = raw;
            }
        }
    }

    if location == PLACEHOLDER && tags.iter().any(|t| t == "Remote") {
        location = "Remote".to_string();
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use serde_json::json;

    const PAGE: &str = r#"
    <html><body>
    <table class="job-preview-inline-table"><tbody>
      <tr role="button">
        <td><a class="job-title-text" href="/jobs/rust-engineer-acme">Rust Engineer</a></td>
        <td><a class="job-company-name-text">Acme</a></td>
        <td><div><svg stroke="currentColor"></svg><span class="align-middle">$120k - $150k</span></div></td>
        <td><span class="text-sm">📍 Berlin</span></td>
        <td class="job-tags"><span class="category">Rust</span><span class="category">DeFi</span></td>
      </tr>
      <tr role="button" class="notAJobAd">
        <td><a class="job-title-text" href="/advertise">Advertise here</a></td>
      </tr>
      <tr role="button">
        <td><a class="job-title-text" href="https://cryptojobslist.com/jobs/solidity-dev">Solidity Dev</a></td>
        <td></td>
        <td><div><span class="align-middle">Full-time</span></div></td>
        <td><span class="text-sm">📍</span></td>
        <td class="job-tags"><span class="category">Remote</span></td>
      </tr>
      <tr role="button">
        <td><span>No link here</span></td>
      </tr>
    </tbody></table>
    </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://cryptojobslist.com/").unwrap()
    }

    #[test]
    fn parses_rows_and_skips_unusable_ones() {
        let sink = MemorySink::new();
        let now = Utc::now();
        let collection =
            parse_listing(PAGE, &base(), &ListingSelectors::default(), now, &sink).unwrap();

        assert_eq!(collection.records.len(), 2);
        assert_eq!(collection.skipped, 1);

        let first = &collection.records[0];
        assert_eq!(first.source, Source::JobScrape);
        assert_eq!(first.primary_text, "Rust Engineer");
        assert_eq!(first.url, "https://cryptojobslist.com/jobs/rust-engineer-acme");
        assert_eq!(first.external_id, "rust-engineer-acme");
        assert_eq!(first.tags, vec!["Rust", "DeFi"]);
        assert_eq!(first.extra["company"], json!("Acme"));
        assert_eq!(first.extra["salary_range"], json!("$120k - $150k"));
        assert_eq!(first.extra["location"], json!("Berlin"));
        assert_eq!(first.collected_at, now);
    }

    #[test]
    fn missing_fields_use_placeholders() {
        let sink = MemorySink::new();
        let collection =
            parse_listing(PAGE, &base(), &ListingSelectors::default(), Utc::now(), &sink)
                .unwrap();

        let second = &collection.records[1];
        assert_eq!(second.external_id, "solidity-dev");
        assert_eq!(second.extra["company"], json!(PLACEHOLDER));
        assert_eq!(second.extra["salary_range"], json!(PLACEHOLDER));
        assert_eq!(second.extra["location"], json!(IMPLIED_REMOTE));
    }

    #[test]
    fn remote_tag_fills_unknown_location() {
        let page = r#"
        <table class="job-preview-inline-table"><tbody>
          <tr role="button">
            <td><a class="job-title-text" href="/jobs/x">X</a></td>
            <td></td>
            <td class="job-tags"><span class="category">Remote</span></td>
          </tr>
        </tbody></table>"#;
        let sink = MemorySink::new();
        let collection =
            parse_listing(page, &base(), &ListingSelectors::default(), Utc::now(), &sink)
                .unwrap();
        assert_eq!(collection.records[0].extra["location"], json!("Remote"));
    }

    #[test]
    fn blank_title_row_is_kept() {
        let page = r#"
        <table class="job-preview-inline-table"><tbody>
          <tr role="button">
            <td><a class="job-title-text" href="/jobs/untitled-role">  </a></td>
          </tr>
          <tr role="button">
            <td><span>no link here</span></td>
          </tr>
        </tbody></table>"#;
        let sink = MemorySink::quiet();
        let collection =
            parse_listing(page, &base(), &ListingSelectors::default(), Utc::now(), &sink)
                .unwrap();
        assert_eq!(collection.records.len(), 1);
        assert_eq!(collection.skipped, 1);
        assert_eq!(collection.records[0].primary_text, "");
        assert_eq!(collection.records[0].external_id, "untitled-role");
    }

    #[test]
    fn missing_table_is_structural_error() {
        let sink = MemorySink::new();
        let err = parse_listing(
            "<html><body><p>maintenance</p></body></html>",
            &base(),
            &ListingSelectors::default(),
            Utc::now(),
            &sink,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Structure { .. }));
    }

    #[test]
    fn empty_table_is_structural_error() {
        let sink = MemorySink::new();
        let page = r#"<table class="job-preview-inline-table"><tbody></tbody></table>"#;
        let err = parse_listing(page, &base(), &ListingSelectors::default(), Utc::now(), &sink)
            .unwrap_err();
        assert!(err.to_string().contains("no job rows"));
    }

    #[test]
    fn invalid_selector_is_reported() {
        let sink = MemorySink::new();
        let selectors = ListingSelectors {
            row: "[[broken".to_string(),
            ..ListingSelectors::default()
        };
        let err = parse_listing(PAGE, &base(), &selectors, Utc::now(), &sink).unwrap_err();
        assert!(matches!(err, AppError::Selector { .. }));
    }
}
