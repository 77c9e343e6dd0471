use std::path::Path;

use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::entity::EntityType;
use crate::error::{MigrateError, Result};
use crate::record::{SqlValue, TargetRecord};
use crate::schema;
use crate::store::Target;

/// SQLite database with one table per entity type. Foreign keys are enforced.
pub struct SqliteTarget {
    conn: Connection,
}

impl SqliteTarget {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn insert_sql(entity: EntityType) -> String {
        let columns = schema::columns(entity);
        let names: Vec<String> = std::iter::once("id".to_string())
            .chain(columns.iter().map(|c| format!("\"{}\"", c.name)))
            .collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|n| format!("?{n}")).collect();
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            entity.table(),
            names.join(", "),
            placeholders.join(", ")
        )
    }

    fn write_rows(&self, entity: EntityType, records: &[TargetRecord]) -> Result<usize> {
        let columns = schema::columns(entity);
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&Self::insert_sql(entity))?;
            for record in records {
                if let Some(unknown) = record
                    .fields
                    .columns()
                    .find(|name| schema::column(entity, name).is_none())
                {
                    return Err(bulk_write_error(
                        entity,
                        format!("record {} sets unknown column '{unknown}'", record.legacy_id),
                    ));
                }
                let values = std::iter::once(SqlValue::Id(record.id)).chain(
                    columns.iter().map(|c| {
                        record.fields.get(c.name).cloned().unwrap_or(SqlValue::Null)
                    }),
                );
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn recreate_tables(&self, entities: &[EntityType]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|err| MigrateError::SchemaReset(err.to_string()))?;
        for entity in entities.iter().rev() {
            tx.execute_batch(&schema::drop_table_sql(*entity))
                .map_err(|err| MigrateError::SchemaReset(format!("drop {}: {err}", entity.table())))?;
        }
        for entity in entities {
            tx.execute_batch(&schema::create_table_sql(*entity))
                .map_err(|err| MigrateError::SchemaReset(format!("create {}: {err}", entity.table())))?;
        }
        tx.commit()
            .map_err(|err| MigrateError::SchemaReset(err.to_string()))
    }
}

fn bulk_write_error(entity: EntityType, message: impl Into<String>) -> MigrateError {
    MigrateError::BulkWrite {
        table: entity.table().to_string(),
        message: message.into(),
    }
}

impl Target for SqliteTarget {
    fn reset(&mut self, entities: &[EntityType]) -> Result<()> {
        // Tables outside `entities` may still hold rows pointing into the ones being
        // dropped. The pragma is a no-op inside a transaction, so it wraps it.
        self.conn
            .execute_batch("PRAGMA foreign_keys=OFF;")
            .map_err(|err| MigrateError::SchemaReset(err.to_string()))?;
        let result = self.recreate_tables(entities);
        self.conn
            .execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|err| MigrateError::SchemaReset(err.to_string()))?;
        result?;
        debug!(tables = entities.len(), "target schema recreated");
        Ok(())
    }

    fn bulk_write(&mut self, entity: EntityType, records: &[TargetRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.write_rows(entity, records).map_err(|err| match err {
            MigrateError::BulkWrite { .. } => err,
            other => bulk_write_error(entity, other.to_string()),
        })
    }

    fn count(&self, entity: EntityType) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", entity.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
