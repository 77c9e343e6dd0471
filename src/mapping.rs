use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;
use uuid::Uuid;

use crate::entity::EntityType;
use crate::error::{MigrateError, Result};
use crate::legacy::LegacyId;
use crate::reference::Reference;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub entity: EntityType,
    pub legacy_id: LegacyId,
    pub new_id: Uuid,
}

/// Legacy id → new id associations for a single run. Write-once: a legacy id can be
/// registered exactly one time.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<LegacyId, (EntityType, Uuid)>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entity: EntityType, legacy_id: LegacyId, new_id: Uuid) -> Result<()> {
        match self.entries.entry(legacy_id) {
            Entry::Occupied(existing) => {
                let (previous, _) = existing.get();
                Err(MigrateError::DuplicateMapping(format!(
                    "'{}' first registered as {previous}, again as {entity}",
                    existing.key()
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert((entity, new_id));
                Ok(())
            }
        }
    }

    pub fn resolve(&self, legacy_id: &LegacyId) -> Result<Uuid> {
        self.entries
            .get(legacy_id)
            .map(|(_, new_id)| *new_id)
            .ok_or_else(|| MigrateError::unresolved(legacy_id.as_str(), "no mapping registered"))
    }

    /// Like [`resolve`](Self::resolve), but the legacy id must belong to `entity`.
    pub fn resolve_as(&self, legacy_id: &LegacyId, entity: EntityType) -> Result<Uuid> {
        match self.entries.get(legacy_id) {
            Some((registered, new_id)) if *registered == entity => Ok(*new_id),
            Some((registered, _)) => Err(MigrateError::unresolved(
                legacy_id.as_str(),
                format!("expected a {entity} record, found {registered}"),
            )),
            None => Err(MigrateError::unresolved(
                legacy_id.as_str(),
                format!("no {entity} mapping registered"),
            )),
        }
    }

    pub fn resolve_optional(&self, reference: &Reference) -> Result<Option<Uuid>> {
        reference
            .legacy_id()
            .map(|legacy_id| self.resolve(legacy_id))
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_for(&self, entity: EntityType) -> usize {
        self.entries.values().filter(|(e, _)| *e == entity).count()
    }

    /// Forget every mapping registered for `entity`. Returns how many were removed.
    pub fn discard(&mut self, entity: EntityType) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (e, _)| *e != entity);
        before - self.entries.len()
    }

    /// All mappings in issue order (new ids are time-ordered).
    pub fn entries(&self) -> Vec<MappingEntry> {
        let mut entries: Vec<MappingEntry> = self
            .entries
            .iter()
            .map(|(legacy_id, (entity, new_id))| MappingEntry {
                entity: *entity,
                legacy_id: legacy_id.clone(),
                new_id: *new_id,
            })
            .collect();
        entries.sort_by_key(|entry| entry.new_id);
        entries
    }
}
