use std::fs;
use std::path::Path;

use chrono::Utc;
use serde_json::json;

use crate::build_info;
use crate::error::Result;
use crate::mapping::IdentityMap;
use crate::report::MigrationReport;

/// Write every `(entity, legacy_id, new_id)` triple of a run to `path` as pretty JSON,
/// in the order the new ids were issued. Returns the number of entries written.
pub fn write_audit_map(path: &Path, mappings: &IdentityMap, report: &MigrationReport) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let entries = mappings.entries();
    let payload = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "tool_git_sha": build_info::git_sha(),
        "outcome": report.outcome,
        "started_at": report.started_at.to_rfc3339(),
        "entries": entries.len(),
        "id_map": entries,
    });

    fs::write(path, serde_json::to_string_pretty(&payload)?)?;
    Ok(entries.len())
}
