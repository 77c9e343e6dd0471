use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{MigrateError, Result};
use crate::legacy::LegacyRecord;
use crate::record::Fields;

use super::Context;

/// How a template is packaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    #[default]
    Image,
    Zip,
}

impl TemplateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Zip => "zip",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(Self::Image),
            "zip" => Ok(Self::Zip),
            other => Err(MigrateError::invalid_field(
                "type",
                format!("unknown template type '{other}' (expected image or zip)"),
            )),
        }
    }
}

pub(super) fn docker_image(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let user_id = ctx.required(record, "user", EntityType::User)?;

    Ok(Fields::new()
        .set("type", record.required_str("type")?)
        .set("template_uri", record.optional_str("template_uri")?)
        .set("docker_id", record.optional_str("docker_id")?)
        .set("tags", record.optional_str("tags")?)
        .set("deletable", record.bool_or("deletable", true)?)
        .set("user_id", user_id)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn deployment(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let app_id = ctx.required(record, "app", EntityType::App)?;
    let user_id = ctx.required(record, "user", EntityType::User)?;

    Ok(Fields::new()
        .set("app_id", app_id)
        .set("user_id", user_id)
        .set("container_name", record.optional_str("container_name")?)
        .set("container_id", record.optional_str("container_id")?)
        .set("uri", record.optional_str("uri")?)
        .set("status", record.required_str("status")?)
        .set("created_at", ctx.timestamp(record, "created_at")?)
        .set("updated_at", ctx.timestamp(record, "updated_at")?))
}

pub(super) fn template(record: &LegacyRecord, ctx: &Context<'_>) -> Result<Fields> {
    let kind = match record.optional_str("type")? {
        Some(raw) => raw.parse::<TemplateType>()?,
        None => TemplateType::default(),
    };

    Ok(Fields::new()
        .set("type", kind.as_str())
        .set("template_uri", record.optional_str("template_uri")?)
        .set("tag_id", record.optional_i64("tag_id")?)
        .set("name", record.required_str("name")?)
        .set("repo_name", record.optional_str("repo_name")?)
        .set("title", record.required_str("title")?)
        .set("description", record.required_str("description")?)
        .set("size", record.optional_i64("size")?)
        .set("digest", record.optional_str("digest")?)
        .set("last_pushed", ctx.timestamp(record, "last_pushed")?))
}
