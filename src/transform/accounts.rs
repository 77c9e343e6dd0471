use crate::entity::EntityType;
use crate::error::Result;
use crate::legacy::LegacyRecord;
use crate::record::Fields;

use super::Context;

pub(super) fn user(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    Ok(Fields::new()
        .set("uid", record.required_str("uid")?)
        .set("username", record.required_str("username")?)
        .set("email", record.required_str("email")?)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn app(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let user_id = ctx.required(record, "user", EntityType::User)?;

    Ok(Fields::new()
        .set("app_name", record.required_str("app_name")?)
        .set("user_id", user_id)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}
