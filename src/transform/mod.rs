//! Per-entity field transformers.
//!
//! A transformer only computes column values: it resolves references through the
//! [`Context`] and validates scalars, but never mints or registers an identity.

mod accounts;
mod evaluations;
mod resources;
mod variants;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entity::EntityType;
use crate::error::Result;
use crate::legacy::LegacyRecord;
use crate::mapping::IdentityMap;
use crate::record::Fields;
use crate::reference::ReferenceResolver;

pub use resources::TemplateType;

pub type TransformFn = fn(&LegacyRecord, &Context<'_>) -> Result<Fields>;

/// Read-only view a transformer gets of the run: resolved references and the timestamp
/// used for defaulted `created_at`/`updated_at` values.
pub struct Context<'a> {
    refs: ReferenceResolver<'a>,
    now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    pub fn new(mappings: &'a IdentityMap, now: DateTime<Utc>) -> Self {
        Self {
            refs: ReferenceResolver::new(mappings),
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn required(&self, record: &LegacyRecord, field: &str, target: EntityType) -> Result<Uuid> {
        self.refs.required(record, field, target)
    }

    pub fn optional(
        &self,
        record: &LegacyRecord,
        field: &str,
        target: EntityType,
    ) -> Result<Option<Uuid>> {
        self.refs.optional(record, field, target)
    }

    pub(crate) fn timestamp(&self, record: &LegacyRecord, field: &str) -> Result<DateTime<Utc>> {
        record.timestamp_or(field, self.now)
    }
}

pub fn transformer(entity: EntityType) -> TransformFn {
    match entity {
        EntityType::User => accounts::user,
        EntityType::App => accounts::app,
        EntityType::DockerImage => resources::docker_image,
        EntityType::Deployment => resources::deployment,
        EntityType::Template => resources::template,
        EntityType::VariantBase => variants::variant_base,
        EntityType::AppVariant => variants::app_variant,
        EntityType::AppVariantRevision => variants::app_variant_revision,
        EntityType::Environment => variants::environment,
        EntityType::EnvironmentRevision => variants::environment_revision,
        EntityType::TestSet => evaluations::test_set,
        EntityType::EvaluatorConfig => evaluations::evaluator_config,
        EntityType::HumanEvaluation => evaluations::human_evaluation,
        EntityType::HumanEvaluationScenario => evaluations::human_evaluation_scenario,
        EntityType::Evaluation => evaluations::evaluation,
        EntityType::EvaluationScenario => evaluations::evaluation_scenario,
    }
}

pub fn transform(entity: EntityType, record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    transformer(entity)(record, ctx)
}
