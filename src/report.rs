use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::entity::EntityType;
use crate::error::MigrateError;
use crate::legacy::LegacyId;
use crate::migrate::FailurePolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Succeeded,
    Partial,
    Aborted,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// A record excluded from the target, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub legacy_id: Option<LegacyId>,
    pub code: &'static str,
    pub message: String,
}

impl RecordFailure {
    pub fn new(legacy_id: Option<LegacyId>, err: &MigrateError) -> Self {
        Self {
            legacy_id,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub entity: EntityType,
    pub read: usize,
    pub transformed: usize,
    pub written: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RecordFailure>,
}

impl EntityReport {
    pub fn new(entity: EntityType) -> Self {
        Self {
            entity,
            read: 0,
            transformed: 0,
            written: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, failure: RecordFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }
}

/// The error that stopped the run, and the entity being migrated at the time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FatalError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityType>,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub policy: FailurePolicy,
    pub order: Vec<EntityType>,
    pub entities: Vec<EntityReport>,
    pub mappings: usize,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalError>,
}

impl MigrationReport {
    pub fn new(policy: FailurePolicy, order: Vec<EntityType>) -> Self {
        Self {
            started_at: Utc::now(),
            policy,
            order,
            ..Self::default()
        }
    }

    pub fn entity(&self, entity: EntityType) -> Option<&EntityReport> {
        self.entities.iter().find(|e| e.entity == entity)
    }

    pub fn push(&mut self, entry: EntityReport) {
        self.entities.push(entry);
    }

    /// Only the first fatal error is kept.
    pub fn abort(&mut self, entity: Option<EntityType>, err: &MigrateError) {
        if self.fatal.is_none() {
            self.fatal = Some(FatalError {
                entity,
                code: err.code(),
                message: err.to_string(),
            });
        }
        self.outcome = Outcome::Aborted;
    }

    pub fn total_read(&self) -> usize {
        self.entities.iter().map(|e| e.read).sum()
    }

    pub fn total_written(&self) -> usize {
        self.entities.iter().map(|e| e.written).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.entities.iter().map(|e| e.failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    fn finalize(&mut self, mappings: usize) {
        self.finished_at = Some(Utc::now());
        self.mappings = mappings;
        self.outcome = if self.fatal.is_some() {
            Outcome::Aborted
        } else if self.total_failed() > 0 {
            Outcome::Partial
        } else {
            Outcome::Succeeded
        };
    }
}

/// Owns the report for the duration of a run and hands it to `emit` exactly once:
/// through [`finish`](Self::finish) on the normal path, or on drop if the run unwound
/// before finishing.
pub struct ReportGuard<F>
where
    F: FnMut(&MigrationReport),
{
    report: MigrationReport,
    emit: F,
    emitted: bool,
}

impl<F> ReportGuard<F>
where
    F: FnMut(&MigrationReport),
{
    pub fn new(report: MigrationReport, emit: F) -> Self {
        Self {
            report,
            emit,
            emitted: false,
        }
    }

    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut MigrationReport {
        &mut self.report
    }

    pub fn finish(mut self, mappings: usize) -> MigrationReport {
        self.report.finalize(mappings);
        (self.emit)(&self.report);
        self.emitted = true;
        std::mem::take(&mut self.report)
    }
}

impl<F> Drop for ReportGuard<F>
where
    F: FnMut(&MigrationReport),
{
    fn drop(&mut self) {
        if self.emitted {
            return;
        }
        self.emitted = true;
        if self.report.fatal.is_none() {
            self.report.fatal = Some(FatalError {
                entity: self.report.entities.last().map(|e| e.entity),
                code: "interrupted",
                message: "run ended before the report was finalized".into(),
            });
        }
        let mappings = self.report.mappings;
        self.report.finalize(mappings);
        (self.emit)(&self.report);
    }
}

/// Default emitter: one log line per entity plus a summary.
pub fn log_report(report: &MigrationReport) {
    for entry in &report.entities {
        info!(
            entity = %entry.entity,
            read = entry.read,
            transformed = entry.transformed,
            written = entry.written,
            failed = entry.failed,
            "entity migrated"
        );
    }
    match (&report.outcome, &report.fatal) {
        (Outcome::Aborted, Some(fatal)) => error!(
            code = fatal.code,
            entity = fatal.entity.map(|e| e.collection()).unwrap_or("-"),
            "migration aborted: {}",
            fatal.message
        ),
        (Outcome::Partial, _) => warn!(
            written = report.total_written(),
            failed = report.total_failed(),
            "migration finished with excluded records"
        ),
        _ => info!(
            written = report.total_written(),
            mappings = report.mappings,
            "migration succeeded"
        ),
    }
}
