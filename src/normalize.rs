// src/normalize.rs

//! Shape detection and defensive field extraction shared by collectors.
//!
//! Raw payloads are classified with [`PayloadShape`] before any item is
//! read. Field helpers never fail: a missing value becomes the documented
//! placeholder so that one sparse item cannot abort a collection.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::events::{CollectorEvent, EventSink};
use crate::models::{NormalizedRecord, PLACEHOLDER, Source};

/// Top-level classification of a JSON payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadShape<'a> {
    Sequence(&'a [Value]),
    Mapping(&'a Map<String, Value>),
    /// Scalar or null; carries the JSON type name
    Unrecognized(&'static str),
}

impl<'a> PayloadShape<'a> {
    pub fn decode(payload: &'a Value) -> Self {
        match payload {
            Value::Array(items) => PayloadShape::Sequence(items),
            Value::Object(fields) => PayloadShape::Mapping(fields),
            scalar => PayloadShape::Unrecognized(json_kind(scalar)),
        }
    }

    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            PayloadShape::Sequence(items) => format!("sequence of {} elements", items.len()),
            PayloadShape::Mapping(fields) => {
                let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
                format!("mapping with keys [{}]", keys.join(", "))
            }
            PayloadShape::Unrecognized(kind) => format!("{kind} value"),
        }
    }

    /// Find the list of raw items inside the payload.
    ///
    /// A mapping yields the first of `keys` that holds an array. A
    /// sequence is treated as an envelope and yields its first element that
    /// is itself an array; no position is assumed.
    pub fn locate_items(&self, keys: &[String]) -> Result<&'a [Value], String> {
        match *self {
            PayloadShape::Mapping(fields) => keys
                .iter()
                .find_map(|key| fields.get(key).and_then(Value::as_array))
                .map(Vec::as_slice)
                .ok_or_else(|| {
                    format!(
                        "{} has no item list under [{}]",
                        self.describe(),
                        keys.join(", ")
                    )
                }),
            PayloadShape::Sequence(elements) => elements
                .iter()
                .find_map(Value::as_array)
                .map(Vec::as_slice)
                .ok_or_else(|| format!("{} holds no nested item list", self.describe())),
            PayloadShape::Unrecognized(_) => Err(format!(
                "{} is neither a sequence nor a mapping",
                self.describe()
            )),
        }
    }
}

/// JSON type name of a value.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Text value of `key`, or [`PLACEHOLDER`] when absent or null.
pub fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        None | Some(Value::Null) => PLACEHOLDER.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Scalar value of `key` as a JSON string, or `null`.
pub fn optional_text(fields: &Map<String, Value>, key: &str) -> Value {
    match fields.get(key) {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Value::String(v.to_string()),
        _ => Value::Null,
    }
}

/// Raw value of `key`, or `null`.
pub fn value_or_null(fields: &Map<String, Value>, key: &str) -> Value {
    fields.get(key).cloned().unwrap_or(Value::Null)
}

/// String list under `key`.
///
/// Absent or null yields an empty list. Returns `None` when the value is
/// present but not a list, so the caller can report it.
pub fn string_list(fields: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        Some(_) => None,
    }
}

/// Normalized output of one collection pass.
#[derive(Debug, Default, Clone)]
pub struct Collection {
    pub records: Vec<NormalizedRecord>,
    /// Raw items that could not be interpreted as records
    pub skipped: usize,
}

/// Accumulates records for one collection pass.
///
/// Tracks identifiers so that search-derived results overlapping earlier
/// ones can be dropped.
pub struct RecordSet<'a> {
    source: Source,
    events: &'a dyn EventSink,
    records: Vec<NormalizedRecord>,
    seen: HashSet<String>,
    skipped: usize,
}

impl<'a> RecordSet<'a> {
    pub fn new(source: Source, events: &'a dyn EventSink) -> Self {
        Self {
            source,
            events,
            records: Vec::new(),
            seen: HashSet::new(),
            skipped: 0,
        }
    }

    /// Append unconditionally.
    pub fn push(&mut self, record: NormalizedRecord) {
        if record.has_external_id() {
            self.seen.insert(record.external_id.clone());
        }
        self.records.push(record);
    }

    /// Append unless a record with the same identifier is already present.
    ///
    /// Returns whether the record was kept.
    pub fn push_unique(&mut self, record: NormalizedRecord) -> bool {
        if record.has_external_id() && self.seen.contains(&record.external_id) {
            self.events.emit(CollectorEvent::DuplicateDropped {
                source: self.source,
                external_id: record.external_id,
            });
            return false;
        }
        self.push(record);
        true
    }

    /// Count an uninterpretable raw item.
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skipped += 1;
        self.events.emit(CollectorEvent::ItemSkipped {
            source: self.source,
            reason: reason.into(),
        });
    }

    /// Report a response whose top-level shape holds no items. Not a skip.
    pub fn unrecognized(&self, detail: impl Into<String>) {
        self.events.emit(CollectorEvent::ShapeUnrecognized {
            source: self.source,
            detail: detail.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finish(self) -> Collection {
        Collection {
            records: self.records,
            skipped: self.skipped,
        }
    }
}
