use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("schema reset failed: {0}")]
    SchemaReset(String),

    #[error("unresolved reference to '{legacy_id}': {reason}")]
    UnresolvedReference { legacy_id: String, reason: String },

    #[error("field '{field}' is invalid: {reason}")]
    FieldValidation { field: String, reason: String },

    #[error("duplicate identity mapping: {0}")]
    DuplicateMapping(String),

    #[error("bulk write to '{table}' failed: {message}")]
    BulkWrite { table: String, message: String },

    #[error("source read failed: {0}")]
    Source(String),

    #[error("identifier generation failed: {0}")]
    IdGeneration(String),

    #[error("invalid migration order: {0}")]
    InvalidOrder(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl MigrateError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SchemaReset(_) => "schema_reset_failure",
            Self::UnresolvedReference { .. } => "unresolved_reference",
            Self::FieldValidation { .. } => "field_validation",
            Self::DuplicateMapping(_) => "duplicate_mapping",
            Self::BulkWrite { .. } => "bulk_write_failure",
            Self::Source(_) => "source_error",
            Self::IdGeneration(_) => "id_generation",
            Self::InvalidOrder(_) => "invalid_order",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Yaml(_) => "yaml_error",
            Self::Db(_) => "db_error",
        }
    }

    /// Record-level errors only invalidate the record being transformed; everything
    /// else aborts the run.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. } | Self::FieldValidation { .. }
        )
    }

    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FieldValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(legacy_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            legacy_id: legacy_id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
