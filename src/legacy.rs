use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MigrateError, Result};
use crate::reference::Reference;

pub const LEGACY_ID_FIELD: &str = "_id";

/// Opaque identifier assigned by the document store (ObjectId hex, string or number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LegacyId(String);

impl LegacyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LegacyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One source document. Read-only for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRecord {
    fields: Map<String, Value>,
}

impl LegacyRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(MigrateError::invalid_field(
                "<document>",
                format!("expected a JSON object, found {}", kind_of(&other)),
            )),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn legacy_id(&self) -> Result<LegacyId> {
        let reference = Reference::from_value(self.get(LEGACY_ID_FIELD))
            .map_err(|reason| MigrateError::invalid_field(LEGACY_ID_FIELD, reason))?;
        reference
            .into_legacy_id()
            .ok_or_else(|| MigrateError::invalid_field(LEGACY_ID_FIELD, "missing"))
    }

    /// Look up a field by dotted path (`config.parameters`). Explicit `null` reads as
    /// absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        (!current.is_null()).then_some(current)
    }

    pub fn required_str(&self, field: &str) -> Result<String> {
        self.optional_str(field)?
            .ok_or_else(|| MigrateError::invalid_field(field, "missing"))
    }

    pub fn optional_str(&self, field: &str) -> Result<Option<String>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(field, "a string", other)),
        }
    }

    pub fn required_i64(&self, field: &str) -> Result<i64> {
        self.optional_i64(field)?
            .ok_or_else(|| MigrateError::invalid_field(field, "missing"))
    }

    pub fn optional_i64(&self, field: &str) -> Result<Option<i64>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => integer_value(value)
                .map(Some)
                .ok_or_else(|| wrong_type(field, "an integer", value)),
        }
    }

    pub fn optional_f64(&self, field: &str) -> Result<Option<f64>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => float_value(value)
                .map(Some)
                .ok_or_else(|| wrong_type(field, "a number", value)),
        }
    }

    pub fn optional_bool(&self, field: &str) -> Result<Option<bool>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(wrong_type(field, "a boolean", other)),
        }
    }

    pub fn bool_or(&self, field: &str, default: bool) -> Result<bool> {
        Ok(self.optional_bool(field)?.unwrap_or(default))
    }

    /// Any non-null value, stored as a JSON document.
    pub fn required_json(&self, field: &str) -> Result<Value> {
        self.get(field)
            .cloned()
            .ok_or_else(|| MigrateError::invalid_field(field, "missing"))
    }

    pub fn optional_json(&self, field: &str) -> Option<Value> {
        self.get(field).cloned()
    }

    pub fn optional_timestamp(&self, field: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => timestamp_value(value)
                .map(Some)
                .ok_or_else(|| wrong_type(field, "a timestamp", value)),
        }
    }

    pub fn timestamp_or(&self, field: &str, default: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Ok(self.optional_timestamp(field)?.unwrap_or(default))
    }
}

fn wrong_type(field: &str, expected: &str, found: &Value) -> MigrateError {
    MigrateError::invalid_field(field, format!("expected {expected}, found {}", kind_of(found)))
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Unwrap MongoDB extended-JSON number wrappers (`$numberInt`, `$numberLong`,
/// `$numberDouble`).
fn extended_number(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    ["$numberInt", "$numberLong", "$numberDouble"]
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(Value::as_str)
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        other => extended_number(other).and_then(|s| s.parse().ok()),
    }
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        other => extended_number(other).and_then(|s| s.parse().ok()),
    }
}

/// Accepts RFC 3339 strings, naive ISO datetimes (read as UTC), epoch milliseconds, and
/// extended-JSON `{"$date": ...}` wrappers around any of those.
fn timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(_) => integer_value(value).and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(object) => match object.get("$date") {
            Some(inner) => timestamp_value(inner),
            None => integer_value(value).and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        },
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
}
