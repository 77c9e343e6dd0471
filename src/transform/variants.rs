//! Bases, variants, revisions and the environments they are deployed to.

use serde_json::Value;

use crate::entity::EntityType;
use crate::error::{MigrateError, Result};
use crate::legacy::LegacyRecord;
use crate::record::Fields;

use super::Context;

pub(super) fn variant_base(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;
    let image_id = ctx.required(record, "image", EntityType::DockerImage)?;
    let deployment_id = ctx.optional(record, "deployment", EntityType::Deployment)?;

    Ok(Fields::new()
        .set("app_id", app_id)
        .set("user_id", user_id)
        .set("base_name", record.required_str("base_name")?)
        .set("image_id", image_id)
        .set("deployment_id", deployment_id)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn app_variant(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let image_id = ctx.required(record, "image", EntityType::DockerImage)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;
    let modified_by_id = ctx.required(record, "modified_by", EntityType::User)?;
    let base_id = ctx.required(record, "base", EntityType::VariantBase)?;

    Ok(Fields::new()
        .set("app_id", app_id)
        .set("variant_name", record.required_str("variant_name")?)
        .set("revision", record.required_i64("revision")?)
        .set("image_id", image_id)
        .set("user_id", user_id)
        .set("modified_by_id", modified_by_id)
        .set("base_name", record.optional_str("base_name")?)
        .set("base_id", base_id)
        .set("config_name", record.required_str("config_name")?)
        .set("config_parameters", record.required_json("config")?)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

/// Revisions nest their configuration as `{"config_name": .., "parameters": {..}}`.
pub(super) fn app_variant_revision(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let variant_id = ctx.required(record, "variant", EntityType::AppVariant)?;
    let modified_by_id = ctx.required(record, "modified_by", EntityType::User)?;
    let base_id = ctx.required(record, "base", EntityType::VariantBase)?;

    let config_name = record.required_str("config.config_name")?;
    let parameters = match record.get("config.parameters") {
        Some(value) => value.clone(),
        None if record.get("config").is_some() => Value::Object(Default::default()),
        None => return Err(MigrateError::invalid_field("config", "missing")),
    };

    Ok(Fields::new()
        .set("variant_id", variant_id)
        .set("revision", record.required_i64("revision")?)
        .set("modified_by_id", modified_by_id)
        .set("base_id", base_id)
        .set("config_name", config_name)
        .set("config_parameters", parameters)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn environment(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;
    let variant_id = ctx.optional(record, "deployed_app_variant", EntityType::AppVariant)?;
    let revision_id = ctx.optional(
        record,
        "deployed_app_variant_revision",
        EntityType::AppVariantRevision,
    )?;
    let deployment_id = ctx.optional(record, "deployment", EntityType::Deployment)?;

    Ok(Fields::new()
        .set("app_id", app_id)
        .set("name", record.required_str("name")?)
        .set("user_id", user_id)
        .set("revision", record.optional_i64("revision")?)
        .set("deployed_app_variant_id", variant_id)
        .set("deployed_app_variant_revision_id", revision_id)
        .set("deployment_id", deployment_id)
        .set("created_at", ctx.timestamp(record, "created_at")?))
}

pub(super) fn environment_revision(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let environment_id = ctx.required(record, "environment", EntityType::Environment)?;
    let modified_by_id = ctx.required(record, "modified_by", EntityType::User)?;
    let revision_id = ctx.optional(
        record,
        "deployed_app_variant_revision",
        EntityType::AppVariantRevision,
    )?;
    let deployment_id = ctx.optional(record, "deployment", EntityType::Deployment)?;

    Ok(Fields::new()
        .set("environment_id", environment_id)
        .set("revision", record.required_i64("revision")?)
        .set("modified_by_id", modified_by_id)
        .set("deployed_app_variant_revision_id", revision_id)
        .set("deployment_id", deployment_id)
        .set("created_at", ctx.timestamp(record, "created_at")?))
}
