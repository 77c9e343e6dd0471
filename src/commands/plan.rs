use colored::Colorize;
use serde::Serialize;

use crate::config::MigrationConfig;
use crate::entity::EntityType;
use crate::error::Result;
use crate::output::Format;

#[derive(Debug, Serialize)]
pub struct PlanStep {
    pub position: usize,
    pub entity: EntityType,
    pub table: &'static str,
    pub depends_on: Vec<EntityType>,
}

/// The order a run would migrate in, with each entity's dependencies.
pub fn build_plan(config: &MigrationConfig) -> Result<Vec<PlanStep>> {
    let migrator = config.migrator()?;
    Ok(migrator
        .order()
        .iter()
        .enumerate()
        .map(|(idx, entity)| PlanStep {
            position: idx + 1,
            entity: *entity,
            table: entity.table(),
            depends_on: entity.dependencies().to_vec(),
        })
        .collect())
}

pub fn run(config: &MigrationConfig, format: Format) -> Result<()> {
    let plan = build_plan(config)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string(&plan)?),
        Format::Pretty => {
            println!("{} ({} policy)", "Migration plan".bold(), config.policy);
            for step in &plan {
                println!("{:>4}. {}", step.position, step.entity.collection().cyan());
                if !step.depends_on.is_empty() {
                    let deps: Vec<&str> = step.depends_on.iter().map(|d| d.collection()).collect();
                    println!("        {} {}", "after:".dimmed(), deps.join(", "));
                }
            }
        }
        Format::Minimal => {
            for step in &plan {
                let deps: Vec<&str> = step.depends_on.iter().map(|d| d.collection()).collect();
                let deps = if deps.is_empty() {
                    "-".to_string()
                } else {
                    deps.join(",")
                };
                println!("{:>2} {:28} {}", step.position, step.entity.collection(), deps);
            }
        }
    }
    Ok(())
}
