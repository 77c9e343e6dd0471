use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqliteValue};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::entity::EntityType;
use crate::legacy::LegacyId;

/// A typed column value headed for the target store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Id(Uuid),
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Json(Value),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_id(&self) -> Option<Uuid> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Self::Id(id) => ToSqlOutput::Owned(SqliteValue::Text(id.to_string())),
            Self::Text(text) => ToSqlOutput::from(text.as_str()),
            Self::Integer(n) => ToSqlOutput::from(*n),
            Self::Real(f) => ToSqlOutput::from(*f),
            Self::Bool(b) => ToSqlOutput::from(*b),
            Self::Json(value) => ToSqlOutput::Owned(SqliteValue::Text(
                serde_json::to_string(value)
                    .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?,
            )),
            Self::Timestamp(ts) => ToSqlOutput::Owned(SqliteValue::Text(ts.to_rfc3339())),
        })
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Id(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Column values computed by a transformer, in insertion order. Carries no identity of
/// its own: the orchestrator attaches the minted id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Fields {
    values: Vec<(&'static str, SqlValue)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fully identified row for one entity's table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRecord {
    pub entity: EntityType,
    pub id: Uuid,
    pub legacy_id: LegacyId,
    pub fields: Fields,
}

impl TargetRecord {
    pub fn new(entity: EntityType, id: Uuid, legacy_id: LegacyId, fields: Fields) -> Self {
        Self {
            entity,
            id,
            legacy_id,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_values_collapse_to_null() {
        assert!(SqlValue::from(None::<String>).is_null());
        assert_eq!(
            SqlValue::from(Some(3_i64)),
            SqlValue::Integer(3)
        );
    }

    #[test]
    fn fields_keep_insertion_order_and_lookup() {
        let id = Uuid::now_v7();
        let fields = Fields::new()
            .set("name", "bob")
            .set("user_id", id)
            .set("note", None::<String>);
        assert_eq!(fields.columns().collect::<Vec<_>>(), vec!["name", "user_id", "note"]);
        assert_eq!(fields.get("user_id").and_then(SqlValue::as_id), Some(id));
        assert!(fields.get("note").unwrap().is_null());
        assert!(fields.get("missing").is_none());
    }

    #[test]
    fn sqlite_round_trips_values() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a TEXT, b TEXT, c INTEGER, d TEXT);")
            .unwrap();

        let id = Uuid::now_v7();
        let doc = json!({"k": [1, 2]});
        conn.execute(
            "INSERT INTO t (a, b, c, d) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                SqlValue::Id(id),
                SqlValue::Json(doc.clone()),
                SqlValue::Bool(true),
                SqlValue::Null
            ],
        )
        .unwrap();

        let (a, b, c, d): (String, String, i64, Option<String>) = conn
            .query_row("SELECT a, b, c, d FROM t", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .unwrap();
        assert_eq!(a, id.to_string());
        assert_eq!(serde_json::from_str::<Value>(&b).unwrap(), doc);
        assert_eq!(c, 1);
        assert_eq!(d, None);
    }
}
