//! Normalizer: turns each source's decoded payload into schema-ordered rows.
//!
//! Everything here is a pure function of its input. Bad rows are skipped one
//! by one and reported as [`RowError`]; a batch is never rejected as a whole.

use std::fmt;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::sources::types::{RawResponse, SourceKind};

/// Earliest accepted Jenkins build timestamp (2000-01-01T00:00:00Z, epoch ms).
pub const MIN_TIMESTAMP_MS: i64 = 946_684_800_000;
/// Latest accepted Jenkins build timestamp (2100-01-01T00:00:00Z, epoch ms).
pub const MAX_TIMESTAMP_MS: i64 = 4_102_444_800_000;

/// Result used when Jenkins reports no result yet (build still running).
pub const DEFAULT_BUILD_RESULT: &str = "RUNNING";
/// Used for ArgoCD sync/health and pod phase when the payload leaves them out.
pub const DEFAULT_STATUS: &str = "Unknown";

/// Column names per source type, in display order.
pub fn schema(kind: SourceKind) -> &'static [&'static str] {
    match kind {
        SourceKind::Jenkins => &["build_number", "result", "duration_sec", "timestamp"],
        SourceKind::ArgoCd => &["application", "sync_status", "health"],
        SourceKind::DockerHub => &["tag", "last_updated"],
        SourceKind::Cluster => &["status", "count"],
    }
}

/// Key holding the row collection inside each source's payload.
fn collection_key(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Jenkins => "builds",
        SourceKind::ArgoCd => "items",
        SourceKind::DockerHub => "results",
        SourceKind::Cluster => "items",
    }
}

/// Borrow the row collection of a payload.
///
/// `None` means the payload does not have the expected top-level shape, which
/// clients report as a parse failure. An explicit `null` collection (ArgoCD
/// does this when no application exists) is an empty batch.
pub fn collection(kind: SourceKind, raw: &RawResponse) -> Option<&[Value]> {
    match raw.get(collection_key(kind))? {
        Value::Array(items) => Some(items.as_slice()),
        Value::Null => Some(&[]),
        _ => None,
    }
}

/// Scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v:.2}"),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// One row, fields in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    fields: Vec<(&'static str, FieldValue)>,
}

impl NormalizedRow {
    fn new(fields: Vec<(&'static str, FieldValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> + '_ {
        self.fields.iter().map(|(k, v)| (*k, v))
    }
}

impl Serialize for NormalizedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A single dropped row. The rest of the batch continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("row is not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is invalid: {detail}")]
    InvalidField { field: &'static str, detail: String },
    #[error("timestamp {0} is outside the accepted epoch-ms range")]
    TimestampOutOfRange(i64),
}

/// Normalize a payload, logging and counting dropped rows.
pub fn normalize(kind: SourceKind, raw: &RawResponse) -> Vec<NormalizedRow> {
    let (rows, dropped) = normalize_with_report(kind, raw);
    for err in &dropped {
        tracing::debug!(source = kind.id(), error = %err, "row dropped");
    }
    if !dropped.is_empty() {
        counter!("normalize_rows_dropped_total", "source" => kind.id())
            .increment(dropped.len() as u64);
    }
    rows
}

/// Normalize a payload and return the dropped-row errors alongside the rows.
pub fn normalize_with_report(
    kind: SourceKind,
    raw: &RawResponse,
) -> (Vec<NormalizedRow>, Vec<RowError>) {
    let items = collection(kind, raw).unwrap_or(&[]);
    match kind {
        SourceKind::Jenkins => each_row(items, build_row),
        SourceKind::ArgoCd => each_row(items, app_row),
        SourceKind::DockerHub => each_row(items, tag_row),
        SourceKind::Cluster => pod_status_rows(items),
    }
}

fn each_row(
    items: &[Value],
    shape: fn(&Value) -> Result<NormalizedRow, RowError>,
) -> (Vec<NormalizedRow>, Vec<RowError>) {
    let mut rows = Vec::with_capacity(items.len());
    let mut dropped = Vec::new();
    for item in items {
        match shape(item) {
            Ok(r) => rows.push(r),
            Err(e) => dropped.push(e),
        }
    }
    (rows, dropped)
}

/// Total pods across a cluster result's status rows.
pub fn pod_total(rows: &[NormalizedRow]) -> i64 {
    rows.iter()
        .filter_map(|r| r.get("count").and_then(FieldValue::as_i64))
        .sum()
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn build_row(item: &Value) -> Result<NormalizedRow, RowError> {
    let obj = item.as_object().ok_or(RowError::NotAnObject)?;

    let number = match obj.get("number") {
        None | Some(Value::Null) => return Err(RowError::MissingField("number")),
        Some(v) => v.as_i64().ok_or_else(|| RowError::InvalidField {
            field: "number",
            detail: format!("expected integer, got {v}"),
        })?,
    };

    let result = obj
        .get("result")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_BUILD_RESULT)
        .to_string();

    let duration_ms = match obj.get("duration") {
        None | Some(Value::Null) => 0.0,
        Some(v) => v.as_f64().ok_or_else(|| RowError::InvalidField {
            field: "duration",
            detail: format!("expected number, got {v}"),
        })?,
    };

    let timestamp = match obj.get("timestamp") {
        None | Some(Value::Null) => return Err(RowError::MissingField("timestamp")),
        Some(v) => epoch_ms_to_datetime(v)?,
    };

    Ok(NormalizedRow::new(vec![
        ("build_number", FieldValue::Int(number)),
        ("result", FieldValue::Text(result)),
        ("duration_sec", FieldValue::Float(round2(duration_ms / 1000.0))),
        ("timestamp", FieldValue::Timestamp(timestamp)),
    ]))
}

// Jenkins reports epoch milliseconds. Anything else (strings, fractions,
// values that only make sense as seconds) is rejected rather than guessed.
fn epoch_ms_to_datetime(v: &Value) -> Result<DateTime<Utc>, RowError> {
    let ms = v.as_i64().ok_or_else(|| RowError::InvalidField {
        field: "timestamp",
        detail: format!("expected integer epoch milliseconds, got {v}"),
    })?;
    if !(MIN_TIMESTAMP_MS..MAX_TIMESTAMP_MS).contains(&ms) {
        return Err(RowError::TimestampOutOfRange(ms));
    }
    DateTime::from_timestamp_millis(ms).ok_or(RowError::TimestampOutOfRange(ms))
}

fn app_row(item: &Value) -> Result<NormalizedRow, RowError> {
    if !item.is_object() {
        return Err(RowError::NotAnObject);
    }
    let name = item
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .ok_or(RowError::MissingField("metadata.name"))?;
    let sync = item
        .pointer("/status/sync/status")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_STATUS);
    let health = item
        .pointer("/status/health/status")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_STATUS);

    Ok(NormalizedRow::new(vec![
        ("application", FieldValue::Text(name.to_string())),
        ("sync_status", FieldValue::Text(sync.to_string())),
        ("health", FieldValue::Text(health.to_string())),
    ]))
}

fn tag_row(item: &Value) -> Result<NormalizedRow, RowError> {
    let obj = item.as_object().ok_or(RowError::NotAnObject)?;
    let tag = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or(RowError::MissingField("name"))?;
    let raw_ts = obj
        .get("last_updated")
        .and_then(Value::as_str)
        .ok_or(RowError::MissingField("last_updated"))?;
    let last_updated = DateTime::parse_from_rfc3339(raw_ts)
        .map_err(|e| RowError::InvalidField {
            field: "last_updated",
            detail: e.to_string(),
        })?
        .with_timezone(&Utc);

    Ok(NormalizedRow::new(vec![
        ("tag", FieldValue::Text(tag.to_string())),
        ("last_updated", FieldValue::Timestamp(last_updated)),
    ]))
}

// Pods are grouped by phase; rows come out in first-seen order.
fn pod_status_rows(items: &[Value]) -> (Vec<NormalizedRow>, Vec<RowError>) {
    let mut counts: Vec<(String, i64)> = Vec::new();
    let mut dropped = Vec::new();
    for pod in items {
        if !pod.is_object() {
            dropped.push(RowError::NotAnObject);
            continue;
        }
        let phase = pod
            .pointer("/status/phase")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_STATUS);
        match counts.iter_mut().find(|(p, _)| p == phase) {
            Some((_, n)) => *n += 1,
            None => counts.push((phase.to_string(), 1)),
        }
    }
    let rows = counts
        .into_iter()
        .map(|(status, count)| {
            NormalizedRow::new(vec![
                ("status", FieldValue::Text(status)),
                ("count", FieldValue::Int(count)),
            ])
        })
        .collect();
    (rows, dropped)
}
