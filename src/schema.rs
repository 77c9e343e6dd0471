//! Relational table definitions for every entity type.
//!
//! Every table has a `TEXT` primary key `id` holding the minted UUID. Foreign keys
//! point at the referenced table's `id`; columns for optional references are nullable.

use crate::entity::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Id,
    Text,
    Integer,
    Real,
    Bool,
    Json,
    Timestamp,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            Self::Id | Self::Text | Self::Json | Self::Timestamp => "TEXT",
            Self::Integer | Self::Bool => "INTEGER",
            Self::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub references: Option<EntityType>,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: false,
        references: None,
    }
}

const fn opt(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: true,
        references: None,
    }
}

const fn fk(name: &'static str, target: EntityType) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Id,
        nullable: false,
        references: Some(target),
    }
}

const fn opt_fk(name: &'static str, target: EntityType) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Id,
        nullable: true,
        references: Some(target),
    }
}

use self::ColumnKind::{Bool, Integer, Json, Real, Text, Timestamp};
use crate::entity::EntityType as E;

const USERS: &[ColumnDef] = &[
    col("uid", Text),
    col("username", Text),
    col("email", Text),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const DOCKER_IMAGES: &[ColumnDef] = &[
    col("type", Text),
    opt("template_uri", Text),
    opt("docker_id", Text),
    opt("tags", Text),
    col("deletable", Bool),
    fk("user_id", E::User),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const APPS: &[ColumnDef] = &[
    col("app_name", Text),
    fk("user_id", E::User),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const DEPLOYMENTS: &[ColumnDef] = &[
    fk("app_id", E::App),
    fk("user_id", E::User),
    opt("container_name", Text),
    opt("container_id", Text),
    opt("uri", Text),
    col("status", Text),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const BASES: &[ColumnDef] = &[
    fk("app_id", E::App),
    fk("user_id", E::User),
    col("base_name", Text),
    fk("image_id", E::DockerImage),
    opt_fk("deployment_id", E::Deployment),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const APP_VARIANTS: &[ColumnDef] = &[
    fk("app_id", E::App),
    col("variant_name", Text),
    col("revision", Integer),
    fk("image_id", E::DockerImage),
    fk("user_id", E::User),
    fk("modified_by_id", E::User),
    opt("base_name", Text),
    fk("base_id", E::VariantBase),
    col("config_name", Text),
    col("config_parameters", Json),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const APP_VARIANT_REVISIONS: &[ColumnDef] = &[
    fk("variant_id", E::AppVariant),
    col("revision", Integer),
    fk("modified_by_id", E::User),
    fk("base_id", E::VariantBase),
    col("config_name", Text),
    col("config_parameters", Json),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const ENVIRONMENTS: &[ColumnDef] = &[
    fk("app_id", E::App),
    col("name", Text),
    fk("user_id", E::User),
    opt("revision", Integer),
    opt_fk("deployed_app_variant_id", E::AppVariant),
    opt_fk("deployed_app_variant_revision_id", E::AppVariantRevision),
    opt_fk("deployment_id", E::Deployment),
    col("created_at", Timestamp),
];

const ENVIRONMENT_REVISIONS: &[ColumnDef] = &[
    fk("environment_id", E::Environment),
    col("revision", Integer),
    fk("modified_by_id", E::User),
    opt_fk("deployed_app_variant_revision_id", E::AppVariantRevision),
    opt_fk("deployment_id", E::Deployment),
    col("created_at", Timestamp),
];

const TEMPLATES: &[ColumnDef] = &[
    col("type", Text),
    opt("template_uri", Text),
    opt("tag_id", Integer),
    col("name", Text),
    opt("repo_name", Text),
    col("title", Text),
    col("description", Text),
    opt("size", Integer),
    opt("digest", Text),
    col("last_pushed", Timestamp),
];

const TEST_SETS: &[ColumnDef] = &[
    col("name", Text),
    fk("app_id", E::App),
    col("csvdata", Json),
    fk("user_id", E::User),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const EVALUATOR_CONFIGS: &[ColumnDef] = &[
    fk("app_id", E::App),
    fk("user_id", E::User),
    col("name", Text),
    col("evaluator_key", Text),
    col("settings_values", Json),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const HUMAN_EVALUATIONS: &[ColumnDef] = &[
    fk("app_id", E::App),
    fk("user_id", E::User),
    col("status", Text),
    col("evaluation_type", Text),
    fk("variant_id", E::AppVariant),
    fk("variant_revision_id", E::AppVariantRevision),
    fk("testset_id", E::TestSet),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const HUMAN_EVALUATION_SCENARIOS: &[ColumnDef] = &[
    fk("user_id", E::User),
    fk("evaluation_id", E::HumanEvaluation),
    col("inputs", Json),
    col("outputs", Json),
    opt("vote", Text),
    opt("score", Json),
    opt("correct_answer", Text),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
    opt("is_pinned", Bool),
    opt("note", Text),
];

const EVALUATIONS: &[ColumnDef] = &[
    fk("app_id", E::App),
    fk("user_id", E::User),
    col("status", Json),
    fk("testset_id", E::TestSet),
    fk("variant_id", E::AppVariant),
    fk("variant_revision_id", E::AppVariantRevision),
    col("aggregated_results", Json),
    opt("average_cost", Json),
    opt("total_cost", Json),
    opt("average_latency", Json),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

const EVALUATION_SCENARIOS: &[ColumnDef] = &[
    fk("user_id", E::User),
    fk("evaluation_id", E::Evaluation),
    fk("variant_id", E::AppVariant),
    col("inputs", Json),
    col("outputs", Json),
    opt("correct_answers", Json),
    opt("is_pinned", Bool),
    opt("note", Text),
    col("results", Json),
    opt("latency", Real),
    opt("cost", Real),
    col("created_at", Timestamp),
    col("updated_at", Timestamp),
];

/// Non-key columns of an entity's table, in declaration order.
pub fn columns(entity: EntityType) -> &'static [ColumnDef] {
    match entity {
        E::User => USERS,
        E::DockerImage => DOCKER_IMAGES,
        E::App => APPS,
        E::Deployment => DEPLOYMENTS,
        E::VariantBase => BASES,
        E::AppVariant => APP_VARIANTS,
        E::AppVariantRevision => APP_VARIANT_REVISIONS,
        E::Environment => ENVIRONMENTS,
        E::EnvironmentRevision => ENVIRONMENT_REVISIONS,
        E::Template => TEMPLATES,
        E::TestSet => TEST_SETS,
        E::EvaluatorConfig => EVALUATOR_CONFIGS,
        E::HumanEvaluation => HUMAN_EVALUATIONS,
        E::HumanEvaluationScenario => HUMAN_EVALUATION_SCENARIOS,
        E::Evaluation => EVALUATIONS,
        E::EvaluationScenario => EVALUATION_SCENARIOS,
    }
}

pub fn column(entity: EntityType, name: &str) -> Option<&'static ColumnDef> {
    columns(entity).iter().find(|c| c.name == name)
}

pub fn foreign_keys(entity: EntityType) -> impl Iterator<Item = &'static ColumnDef> {
    columns(entity).iter().filter(|c| c.references.is_some())
}

pub fn create_table_sql(entity: EntityType) -> String {
    let mut lines = vec!["id TEXT PRIMARY KEY NOT NULL".to_string()];
    for column in columns(entity) {
        let mut line = format!("\"{}\" {}", column.name, column.kind.sql_type());
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        if let Some(target) = column.references {
            line.push_str(&format!(" REFERENCES \"{}\"(id)", target.table()));
        }
        lines.push(line);
    }
    format!(
        "CREATE TABLE \"{}\" (\n    {}\n);",
        entity.table(),
        lines.join(",\n    ")
    )
}

pub fn drop_table_sql(entity: EntityType) -> String {
    format!("DROP TABLE IF EXISTS \"{}\";", entity.table())
}
