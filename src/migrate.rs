//! Dependency-ordered migration of every collection.
//!
//! A run resets the target schema once, then for each entity type in order reads the
//! whole collection, transforms each record, mints and registers its new identity, and
//! bulk-writes the successes. The report is emitted exactly once, whatever happens.

use std::fmt;

use chrono::Utc;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::entity::{self, EntityType};
use crate::error::{MigrateError, Result};
use crate::id::IdGenerator;
use crate::mapping::IdentityMap;
use crate::record::TargetRecord;
use crate::report::{EntityReport, MigrationReport, RecordFailure, ReportGuard, log_report};
use crate::store::{Source, Target};
use crate::transform::{self, Context};

/// What to do when a single record cannot be migrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Exclude the record, keep going. Dependents of the record fail in turn.
    #[default]
    BestEffort,
    /// Abort the run on the first excluded record.
    FailFast,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BestEffort => "best_effort",
            Self::FailFast => "fail_fast",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    SchemaReset,
    Migrating(EntityType),
    Reported,
}

impl RunState {
    fn advance(&mut self, next: RunState) {
        debug!(from = ?*self, to = ?next, "run state");
        *self = next;
    }

    fn entity(self) -> Option<EntityType> {
        match self {
            Self::Migrating(entity) => Some(entity),
            _ => None,
        }
    }
}

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: MigrationReport,
    pub mappings: IdentityMap,
    pub state: RunState,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.report.is_success()
    }
}

#[derive(Debug, Clone)]
pub struct Migrator {
    policy: FailurePolicy,
    order: Vec<EntityType>,
}

impl Migrator {
    /// Migrator over every entity type in computed dependency order.
    pub fn new(policy: FailurePolicy) -> Result<Self> {
        Ok(Self {
            policy,
            order: entity::dependency_order()?,
        })
    }

    /// Replace the computed order with an explicit one. Rejected unless every entity's
    /// dependencies come before it.
    pub fn with_order(mut self, order: Vec<EntityType>) -> Result<Self> {
        entity::validate_order(&order)?;
        self.order = order;
        Ok(self)
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn order(&self) -> &[EntityType] {
        &self.order
    }

    /// Run with the report logged through `tracing`.
    pub fn run<S, T>(&self, source: &S, target: &mut T) -> RunOutcome
    where
        S: Source + ?Sized,
        T: Target + ?Sized,
    {
        self.run_with(source, target, log_report)
    }

    pub fn run_with<S, T, F>(&self, source: &S, target: &mut T, emit: F) -> RunOutcome
    where
        S: Source + ?Sized,
        T: Target + ?Sized,
        F: FnMut(&MigrationReport),
    {
        let mut guard = ReportGuard::new(MigrationReport::new(self.policy, self.order.clone()), emit);
        let mut mappings = IdentityMap::new();
        let mut state = RunState::Init;

        info!(policy = %self.policy, entities = self.order.len(), "migration started");
        let result = self.execute(source, target, &mut mappings, guard.report_mut(), &mut state);
        if let Err(err) = result {
            error!(code = err.code(), entity = ?state.entity(), "fatal: {err}");
            guard.report_mut().abort(state.entity(), &err);
        }

        state.advance(RunState::Reported);
        let report = guard.finish(mappings.len());
        RunOutcome {
            report,
            mappings,
            state,
        }
    }

    fn execute<S, T>(
        &self,
        source: &S,
        target: &mut T,
        mappings: &mut IdentityMap,
        report: &mut MigrationReport,
        state: &mut RunState,
    ) -> Result<()>
    where
        S: Source + ?Sized,
        T: Target + ?Sized,
    {
        state.advance(RunState::SchemaReset);
        target.reset(&self.order)?;

        let mut ids = IdGenerator::new();
        for &entity in &self.order {
            state.advance(RunState::Migrating(entity));
            let span = info_span!("migrate", entity = %entity);
            let _enter = span.enter();

            let mut entry = EntityReport::new(entity);
            let result = self.migrate_entity(entity, source, target, &mut ids, mappings, &mut entry);
            report.push(entry);
            if result.is_err() {
                // The batch was never written, so none of its new ids exist in the target.
                let dropped = mappings.discard(entity);
                if dropped > 0 {
                    debug!(dropped, "discarded mappings of unwritten records");
                }
            }
            result?;
        }
        Ok(())
    }

    /// One collection. Returns `Err` only for run-fatal errors; `entry` is filled in on
    /// every path.
    fn migrate_entity<S, T>(
        &self,
        entity: EntityType,
        source: &S,
        target: &mut T,
        ids: &mut IdGenerator,
        mappings: &mut IdentityMap,
        entry: &mut EntityReport,
    ) -> Result<()>
    where
        S: Source + ?Sized,
        T: Target + ?Sized,
    {
        let records = source.read_collection(entity.collection())?;
        entry.read = records.len();
        debug!(read = entry.read, "collection loaded");

        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            let legacy_id = match record.legacy_id() {
                Ok(id) => id,
                Err(err) => {
                    self.record_failed(entry, RecordFailure::new(None, &err), err)?;
                    continue;
                }
            };

            let transformed = {
                let ctx = Context::new(mappings, Utc::now());
                transform::transform(entity, record, &ctx)
            };
            let fields = match transformed {
                Ok(fields) => fields,
                Err(err) if err.is_record_level() => {
                    let failure = RecordFailure::new(Some(legacy_id), &err);
                    self.record_failed(entry, failure, err)?;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let new_id = ids.next_id()?;
            mappings.record(entity, legacy_id.clone(), new_id)?;
            rows.push(TargetRecord::new(entity, new_id, legacy_id, fields));
            entry.transformed += 1;
        }

        entry.written = target.bulk_write(entity, &rows)?;
        info!(
            read = entry.read,
            written = entry.written,
            mapped = mappings.count_for(entity),
            failed = entry.failed,
            "collection migrated"
        );
        Ok(())
    }

    fn record_failed(
        &self,
        entry: &mut EntityReport,
        failure: RecordFailure,
        err: MigrateError,
    ) -> Result<()> {
        warn!(
            legacy_id = failure.legacy_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            code = failure.code,
            "record excluded: {}",
            failure.message
        );
        entry.record_failure(failure);
        match self.policy {
            FailurePolicy::BestEffort => Ok(()),
            FailurePolicy::FailFast => Err(err),
        }
    }
}
