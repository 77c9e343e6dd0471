pub mod source;
pub mod target;

use crate::entity::EntityType;
use crate::error::Result;
use crate::legacy::LegacyRecord;
use crate::record::TargetRecord;

pub use source::{JsonDirSource, MemorySource};
pub use target::SqliteTarget;

/// Document store the migration reads from.
pub trait Source {
    /// Every document of a named collection. A collection that does not exist reads
    /// as empty.
    fn read_collection(&self, collection: &str) -> Result<Vec<LegacyRecord>>;
}

/// Relational store the migration writes to.
pub trait Target {
    /// Drop and recreate the tables of `entities`, which must be in dependency order.
    fn reset(&mut self, entities: &[EntityType]) -> Result<()>;

    /// Insert all rows for one entity in a single transaction. Returns the number of
    /// rows written.
    fn bulk_write(&mut self, entity: EntityType, records: &[TargetRecord]) -> Result<usize>;

    fn count(&self, entity: EntityType) -> Result<usize>;
}
