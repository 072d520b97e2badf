//! Record model

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Naive layouts accepted besides RFC 3339; read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// An opaque row of one collection.
///
/// The sync engine only looks at `id`, `updated_at` and `created_at`; every
/// other field travels untouched between the local store and the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap an already-built JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Convert an arbitrary JSON value, rejecting anything but an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(Error::InvalidInput(format!(
                "record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Stable key of this record within its collection.
    ///
    /// String ids are used verbatim and integer ids in decimal, so `1` and
    /// `"1"` address the same row.
    pub fn id_key(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(id) if id.is_i64() || id.is_u64() => Some(id.to_string()),
            _ => None,
        }
    }

    /// Last-modified moment: `updated_at`, falling back to `created_at`.
    ///
    /// `None` sorts below every timestamp, so an untimestamped record never
    /// wins a comparison against a timestamped peer.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.0
            .get("updated_at")
            .and_then(parse_timestamp)
            .or_else(|| self.0.get("created_at").and_then(parse_timestamp))
    }

    /// Whether the record changed strictly after `since`.
    ///
    /// With no cursor every record counts as changed; with a cursor an
    /// untimestamped record never does.
    pub fn changed_since(&self, since: Option<DateTime<Utc>>) -> bool {
        since.map_or(true, |since| {
            self.timestamp().is_some_and(|timestamp| timestamp > since)
        })
    }

    /// Read a single field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a single field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Borrow the underlying JSON object.
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Record {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

/// Parse the timestamp encodings found in CRM rows.
///
/// Unparseable values are treated as "no timestamp" rather than an error.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp_str(raw),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
