use std::fs;
use std::path::PathBuf;

use tracing::{error, info};

use crate::audit::write_audit_map;
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::migrate::FailurePolicy;
use crate::output::{self, Format, RunSummary};
use crate::report::Outcome;
use crate::store::{JsonDirSource, SqliteTarget};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub source: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub policy: Option<FailurePolicy>,
    pub audit_map: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut MigrationConfig) {
        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if let Some(target) = &self.target {
            config.target = target.clone();
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(audit_map) = &self.audit_map {
            config.audit_map = Some(audit_map.clone());
        }
    }
}

pub fn run(mut config: MigrationConfig, overrides: &RunOverrides, format: Format) -> Result<Outcome> {
    overrides.apply(&mut config);
    let migrator = config.migrator()?;
    let source = JsonDirSource::open(&config.source)?;

    let mut target = if overrides.dry_run {
        SqliteTarget::open_memory()?
    } else {
        if let Some(parent) = config.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        SqliteTarget::open(&config.target)?
    };

    info!(
        source = %config.source.display(),
        target = %config.target.display(),
        dry_run = overrides.dry_run,
        "starting run"
    );
    let outcome = migrator.run(&source, &mut target);

    let audit = match &config.audit_map {
        Some(path) => match write_audit_map(path, &outcome.mappings, &outcome.report) {
            Ok(entries) => {
                info!(path = %path.display(), entries, "wrote audit map");
                Ok(Some(path.display().to_string()))
            }
            Err(err) => {
                error!(path = %path.display(), "cannot write audit map: {err}");
                Err(err)
            }
        },
        None => Ok(None),
    };

    let summary = RunSummary {
        report: &outcome.report,
        dry_run: overrides.dry_run,
        target: config.target.display().to_string(),
        audit_map: audit.as_ref().ok().cloned().flatten(),
    };
    output::print_run(&summary, format)?;
    audit?;
    Ok(outcome.report.outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::store::Target;
    use tempfile::tempdir;

    fn write_dump(dir: &std::path::Path) {
        fs::write(
            dir.join("users.json"),
            r#"[{"_id": {"$oid": "u1"}, "uid": "a", "username": "bob", "email": "b@x.com"}]"#,
        )
        .unwrap();
        fs::write(
            dir.join("app_db.json"),
            r#"[{"_id": {"$oid": "a1"}, "app_name": "chat", "user": {"$ref": "users", "$id": {"$oid": "u1"}}}]"#,
        )
        .unwrap();
    }

    #[test]
    fn overrides_win_over_config() {
        let mut config = MigrationConfig::default();
        let overrides = RunOverrides {
            target: Some(PathBuf::from("/tmp/out.db")),
            policy: Some(FailurePolicy::FailFast),
            ..RunOverrides::default()
        };
        overrides.apply(&mut config);
        assert_eq!(config.target, PathBuf::from("/tmp/out.db"));
        assert_eq!(config.policy, FailurePolicy::FailFast);
        assert_eq!(config.source, PathBuf::from("dump"));
    }

    #[test]
    fn run_writes_target_and_audit_map() {
        let dir = tempdir().unwrap();
        let dump = dir.path().join("dump");
        fs::create_dir_all(&dump).unwrap();
        write_dump(&dump);

        let config = MigrationConfig {
            source: dump,
            target: dir.path().join("out").join("migrated.db"),
            audit_map: Some(dir.path().join("id-map.json")),
            ..MigrationConfig::default()
        };
        let outcome = run(config.clone(), &RunOverrides::default(), Format::Minimal).unwrap();
        assert_eq!(outcome, Outcome::Succeeded);

        let target = SqliteTarget::open(&config.target).unwrap();
        assert_eq!(target.count(EntityType::User).unwrap(), 1);
        assert_eq!(target.count(EntityType::App).unwrap(), 1);
        assert!(dir.path().join("id-map.json").is_file());
    }

    #[test]
    fn dry_run_leaves_no_database_behind() {
        let dir = tempdir().unwrap();
        write_dump(dir.path());

        let config = MigrationConfig {
            source: dir.path().to_path_buf(),
            target: dir.path().join("migrated.db"),
            ..MigrationConfig::default()
        };
        let overrides = RunOverrides {
            dry_run: true,
            ..RunOverrides::default()
        };
        let outcome = run(config, &overrides, Format::Minimal).unwrap();
        assert_eq!(outcome, Outcome::Succeeded);
        assert!(!dir.path().join("migrated.db").exists());
    }

    #[test]
    fn unwritable_audit_map_fails_after_the_database_is_written() {
        let dir = tempdir().unwrap();
        write_dump(dir.path());
        let blocked = dir.path().join("audit");
        fs::create_dir_all(&blocked).unwrap();

        let config = MigrationConfig {
            source: dir.path().to_path_buf(),
            target: dir.path().join("migrated.db"),
            audit_map: Some(blocked),
            ..MigrationConfig::default()
        };
        let err = run(config.clone(), &RunOverrides::default(), Format::Minimal).unwrap_err();
        assert_eq!(err.code(), "io_error");

        let target = SqliteTarget::open(&config.target).unwrap();
        assert_eq!(target.count(EntityType::App).unwrap(), 1);
    }
}
