use crate::entity::EntityType;
use crate::error::Result;
use crate::legacy::LegacyRecord;
use crate::record::Fields;

use super::Context;

pub(super) fn test_set(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;

    Ok(Fields::new()
        .set("name", record.required_str("name")?)
        .set("app_id", app_id)
        .set("csvdata", record.required_json("csvdata")?)
        .set("user_id", user_id)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn evaluator_config(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;

    Ok(Fields::new()
        .set("app_id", app_id)
        .set("user_id", user_id)
        .set("name", record.required_str("name")?)
        .set("evaluator_key", record.required_str("evaluator_key")?)
        .set("settings_values", record.required_json("settings_values")?)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

/// Human evaluations list the compared variants; only the first one is kept.
pub(super) fn human_evaluation(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;
    let testset_id = ctx.required(record, "testset", EntityType::TestSet)?;
    let variant_id = ctx.required(record, "variants", EntityType::AppVariant)?;
    let revision_id = ctx.required(record, "variants_revisions", EntityType::AppVariantRevision)?;

    Ok(Fields::new()
        .set("app_id", app_id)
        .set("user_id", user_id)
        .set("status", record.required_str("status")?)
        .set("evaluation_type", record.required_str("evaluation_type")?)
        .set("variant_id", variant_id)
        .set("variant_revision_id", revision_id)
        .set("testset_id", testset_id)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn human_evaluation_scenario(
    record: &LegacyRecord,
    ctx: &Context<'_>,
) -> Result<Fields> {
    let user_id = ctx.required(record, "user", EntityType::User)?;
    let evaluation_id = ctx.required(record, "evaluation", EntityType::HumanEvaluation)?;

    Ok(Fields::new()
        .set("user_id", user_id)
        .set("evaluation_id", evaluation_id)
        .set("inputs", record.required_json("inputs")?)
        .set("outputs", record.required_json("outputs")?)
        .set("vote", record.optional_str("vote")?)
        .set("score", record.optional_json("score"))
        .set("correct_answer", record.optional_str("correct_answer")?)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?)
        .set("is_pinned", record.optional_bool("is_pinned")?)
        .set("note", record.optional_str("note")?))
}

pub(super) fn evaluation(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;
    let testset_id = ctx.required(record, "testset", EntityType::TestSet)?;
    let variant_id = ctx.required(record, "variant", EntityType::AppVariant)?;
    let revision_id = ctx.required(record, "variant_revision", EntityType::AppVariantRevision)?;

    Ok(Fields::new()
        .set("app_id", app_id)
        .set("user_id", user_id)
        .set("status", record.required_json("status")?)
        .set("testset_id", testset_id)
        .set("variant_id", variant_id)
        .set("variant_revision_id", revision_id)
        .set("aggregated_results", record.required_json("aggregated_results")?)
        .set("average_cost", record.optional_json("average_cost"))
        .set("total_cost", record.optional_json("total_cost"))
        .set("average_latency", record.optional_json("average_latency"))
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn evaluation_scenario(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let user_id = ctx.required(record, "user", EntityType::User)?;
    let evaluation_id = ctx.required(record, "evaluation", EntityType::Evaluation)?;
    let variant_id = ctx.required(record, "variant_id", EntityType::AppVariant)?;

    Ok(Fields::new()
        .set("user_id", user_id)
        .set("evaluation_id", evaluation_id)
        .set("variant_id", variant_id)
        .set("inputs", record.required_json("inputs")?)
        .set("outputs", record.required_json("outputs")?)
        .set("correct_answers", record.optional_json("correct_answers"))
        .set("is_pinned", record.optional_bool("is_pinned")?)
        .set("note", record.optional_str("note")?)
        .set("results", record.required_json("results")?)
        .set("latency", record.optional_f64("latency")?)
        .set("cost", record.optional_f64("cost")?)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}
