use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::EntityType;
use crate::error::{MigrateError, Result};
use crate::migrate::{FailurePolicy, Migrator};

pub const DEFAULT_CONFIG_FILE: &str = "docmigrate.yaml";

/// Settings for a run. Every field is optional in the YAML file.
///
/// ```yaml
/// source: ./dump
/// target: ./migrated.db
/// policy: fail_fast
/// audit_map: ./id-map.json
/// order: [users, app_db]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    pub source: PathBuf,
    pub target: PathBuf,
    pub policy: FailurePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<EntityType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_map: Option<PathBuf>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("dump"),
            target: PathBuf::from("migrated.db"),
            policy: FailurePolicy::default(),
            order: None,
            audit_map: None,
        }
    }
}

impl MigrationConfig {
    /// Parse a YAML config file. Relative paths inside it are taken relative to the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            MigrateError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let mut config = Self::parse(&raw)
            .map_err(|err| MigrateError::Config(format!("{}: {err}", path.display())))?;

        if let Some(base) = path.parent() {
            config.source = rebase(base, &config.source);
            config.target = rebase(base, &config.target);
            config.audit_map = config.audit_map.map(|p| rebase(base, &p));
        }
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// `explicit` must exist; otherwise `docmigrate.yaml` in `dir` is used when present,
    /// and built-in defaults when not.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn migrator(&self) -> Result<Migrator> {
        let migrator = Migrator::new(self.policy)?;
        match &self.order {
            Some(order) => migrator.with_order(order.clone()),
            None => Ok(migrator),
        }
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
