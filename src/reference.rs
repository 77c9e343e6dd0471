use serde::Deserialize;
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::entity::EntityType;
use crate::error::{MigrateError, Result};
use crate::legacy::{LegacyId, LegacyRecord, kind_of};
use crate::mapping::IdentityMap;

/// Shapes a reference can take in a source document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawReference {
    Null(()),
    Id(String),
    Number(Number),
    ObjectId {
        #[serde(rename = "$oid")]
        oid: String,
    },
    Pointer {
        #[serde(rename = "$ref", default)]
        collection: Option<String>,
        #[serde(rename = "$id")]
        id: Box<RawReference>,
    },
    Link {
        id: Box<RawReference>,
        #[serde(default)]
        collection: Option<String>,
    },
    Many(Vec<RawReference>),
}

/// Canonical reference: either absent or pointing at one legacy id. `collection`
/// keeps the pointer's declared target collection when the source carried one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reference {
    legacy_id: Option<LegacyId>,
    collection: Option<String>,
}

impl Reference {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn to(legacy_id: impl Into<LegacyId>) -> Self {
        Self {
            legacy_id: Some(legacy_id.into()),
            collection: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.legacy_id.is_some()
    }

    pub fn legacy_id(&self) -> Option<&LegacyId> {
        self.legacy_id.as_ref()
    }

    pub fn into_legacy_id(self) -> Option<LegacyId> {
        self.legacy_id
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Normalize a raw field value. A missing field and `null` both yield an absent
    /// reference; arrays contribute only their first element. The error is a
    /// human-readable reason.
    pub fn from_value(value: Option<&Value>) -> std::result::Result<Self, String> {
        let Some(value) = value else {
            return Ok(Self::absent());
        };
        let raw = RawReference::deserialize(value).map_err(|_| {
            format!("unsupported reference shape ({})", kind_of(value))
        })?;
        normalize(raw, None)
    }
}

fn normalize(raw: RawReference, collection: Option<String>) -> std::result::Result<Reference, String> {
    match raw {
        RawReference::Null(()) => Ok(Reference::absent()),
        RawReference::Id(id) => {
            let trimmed = id.trim();
            if trimmed.is_empty() {
                return Err("reference id cannot be empty".into());
            }
            Ok(Reference {
                legacy_id: Some(LegacyId::new(trimmed)),
                collection,
            })
        }
        RawReference::Number(n) => Ok(Reference {
            legacy_id: Some(LegacyId::new(n.to_string())),
            collection,
        }),
        RawReference::ObjectId { oid } => normalize(RawReference::Id(oid), collection),
        RawReference::Pointer { collection: c, id } | RawReference::Link { id, collection: c } => {
            let inner = normalize(*id, c.or(collection))?;
            if !inner.is_present() {
                return Err("pointer reference has no id".into());
            }
            Ok(inner)
        }
        RawReference::Many(items) => match items.into_iter().next() {
            Some(first) => normalize(first, collection),
            None => Ok(Reference::absent()),
        },
    }
}

/// Resolves reference fields of a record through the run's identity mappings.
pub struct ReferenceResolver<'a> {
    mappings: &'a IdentityMap,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(mappings: &'a IdentityMap) -> Self {
        Self { mappings }
    }

    pub fn reference(&self, record: &LegacyRecord, field: &str) -> Result<Reference> {
        Reference::from_value(record.get(field))
            .map_err(|reason| MigrateError::invalid_field(field, reason))
    }

    /// A required reference: absent values and unknown ids are both unresolved.
    pub fn required(&self, record: &LegacyRecord, field: &str, target: EntityType) -> Result<Uuid> {
        let reference = self.reference(record, field)?;
        if !reference.is_present() {
            return Err(MigrateError::unresolved(
                "null",
                format!("required field '{field}' ({target}) is absent"),
            ));
        }
        self.lookup(field, &reference, target)
    }

    pub fn optional(
        &self,
        record: &LegacyRecord,
        field: &str,
        target: EntityType,
    ) -> Result<Option<Uuid>> {
        let reference = self.reference(record, field)?;
        if reference.is_present() {
            self.lookup(field, &reference, target).map(Some)
        } else {
            Ok(None)
        }
    }

    fn lookup(&self, field: &str, reference: &Reference, target: EntityType) -> Result<Uuid> {
        let Some(legacy_id) = reference.legacy_id() else {
            return Err(MigrateError::unresolved("null", format!("field '{field}' is absent")));
        };
        self.mappings
            .resolve_as(legacy_id, target)
            .map_err(|err| match err {
                MigrateError::UnresolvedReference { legacy_id, reason } => {
                    let hint = reference
                        .collection()
                        .map(|c| format!(" (points at {c})"))
                        .unwrap_or_default();
                    MigrateError::unresolved(legacy_id, format!("field '{field}'{hint}: {reason}"))
                }
                other => other,
            })
    }
}
