use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::report::{EntityReport, MigrationReport, Outcome};

const PRETTY_FAILURES_PER_ENTITY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

/// What `run` prints: the report plus where the results went.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    #[serde(flatten)]
    pub report: &'a MigrationReport,
    pub dry_run: bool,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_map: Option<String>,
}

pub fn print_run(summary: &RunSummary<'_>, format: Format) -> Result<()> {
    let report = summary.report;
    match format {
        Format::Json => println!("{}", serde_json::to_string(summary)?),
        Format::Pretty => {
            let outcome = match report.outcome {
                Outcome::Succeeded => "succeeded".green().bold(),
                Outcome::Partial => "partial".yellow().bold(),
                Outcome::Aborted => "aborted".red().bold(),
            };
            println!("Migration {} ({} policy)", outcome, report.policy);
            let target = if summary.dry_run {
                format!("{} (dry run, discarded)", summary.target)
            } else {
                summary.target.clone()
            };
            println!("  {} {}", "target:".dimmed(), target);
            println!();
            for entry in &report.entities {
                print_entity_pretty(entry);
            }
            let skipped = report.order.len().saturating_sub(report.entities.len());
            if skipped > 0 {
                println!("  {}", format!("{skipped} entity type(s) not reached").dimmed());
            }
            println!();
            println!(
                "  {} read {} / written {} / failed {} / mappings {}",
                "totals:".dimmed(),
                report.total_read(),
                report.total_written(),
                report.total_failed(),
                report.mappings
            );
            if let Some(fatal) = &report.fatal {
                let at = fatal
                    .entity
                    .map(|e| format!(" during {e}"))
                    .unwrap_or_default();
                println!("  {} [{}]{} {}", "fatal:".red().bold(), fatal.code, at, fatal.message);
            }
            if let Some(path) = &summary.audit_map {
                println!("  {} {}", "audit map:".dimmed(), path);
            }
        }
        Format::Minimal => {
            println!(
                "{:28} {:>6} {:>6} {:>6} {:>6}",
                "ENTITY", "READ", "XFORM", "WRITE", "FAIL"
            );
            println!("{}", "-".repeat(56));
            for entry in &report.entities {
                println!(
                    "{:28} {:>6} {:>6} {:>6} {:>6}",
                    entry.entity.collection(),
                    entry.read,
                    entry.transformed,
                    entry.written,
                    entry.failed
                );
            }
            println!(
                "outcome={} written={} failed={} mappings={}",
                report.outcome,
                report.total_written(),
                report.total_failed(),
                report.mappings
            );
        }
    }
    Ok(())
}

fn print_entity_pretty(entry: &EntityReport) {
    let marker = if entry.failed == 0 {
        " ok ".green()
    } else {
        "fail".yellow()
    };
    println!(
        "  [{}] {:28} read {:>5}  written {:>5}  failed {:>5}",
        marker,
        entry.entity.collection(),
        entry.read,
        entry.written,
        entry.failed
    );
    for failure in entry.failures.iter().take(PRETTY_FAILURES_PER_ENTITY) {
        let legacy = failure
            .legacy_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("<no _id>");
        println!(
            "         {} {}",
            legacy.dimmed(),
            truncate_message(&failure.message, 100)
        );
    }
    if entry.failures.len() > PRETTY_FAILURES_PER_ENTITY {
        println!(
            "         {}",
            format!("... {} more", entry.failures.len() - PRETTY_FAILURES_PER_ENTITY).dimmed()
        );
    }
}

pub fn truncate_message(message: &str, max_len: usize) -> String {
    if message.chars().count() > max_len {
        let truncated: String = message.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::migrate::FailurePolicy;

    #[test]
    fn truncate_message_respects_char_boundaries() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(truncate_message("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn run_summary_flattens_report_fields() {
        let report = MigrationReport::new(FailurePolicy::BestEffort, vec![EntityType::User]);
        let summary = RunSummary {
            report: &report,
            dry_run: true,
            target: ":memory:".into(),
            audit_map: None,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["policy"], "best_effort");
        assert_eq!(value["order"][0], "users");
        assert!(value.get("audit_map").is_none());
    }
}
