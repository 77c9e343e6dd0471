use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docmigrate::commands::run::RunOverrides;
use docmigrate::config::MigrationConfig;
use docmigrate::migrate::FailurePolicy;
use docmigrate::output::Format;
use docmigrate::report::Outcome;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DOCMIGRATE_LOG";

#[derive(Parser)]
#[command(
    name = "docmigrate",
    version,
    about = "Migrate a MongoDB export into a relational SQLite schema with remapped ids"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Config file (defaults to ./docmigrate.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the target schema and migrate every collection (default)
    Run {
        /// Directory holding one <collection>.json or .jsonl file per collection
        #[arg(long)]
        source: Option<PathBuf>,
        /// SQLite database to (re)create
        #[arg(long)]
        target: Option<PathBuf>,
        /// What to do with records that cannot be migrated
        #[arg(long, value_enum)]
        policy: Option<FailurePolicy>,
        /// Write the legacy id -> new id map to this JSON file
        #[arg(long)]
        audit_map: Option<PathBuf>,
        /// Migrate into an in-memory database and discard it
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the order entity types will be migrated in
    Plan,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("docmigrate=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli, format: Format) -> docmigrate::error::Result<Outcome> {
    let cwd = std::env::current_dir()?;
    let config = MigrationConfig::discover(cli.config.as_deref(), &cwd)?;

    match cli.command.unwrap_or(Commands::Run {
        source: None,
        target: None,
        policy: None,
        audit_map: None,
        dry_run: false,
    }) {
        Commands::Run {
            source,
            target,
            policy,
            audit_map,
            dry_run,
        } => {
            let overrides = RunOverrides {
                source,
                target,
                policy,
                audit_map,
                dry_run,
            };
            docmigrate::commands::run::run(config, &overrides, format)
        }
        Commands::Plan => {
            docmigrate::commands::plan::run(&config, format)?;
            Ok(Outcome::Succeeded)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    init_tracing();

    match run(cli, format) {
        Ok(Outcome::Succeeded) => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            match format {
                Format::Json => {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "error": e.code(),
                            "message": e.to_string()
                        })
                    );
                }
                _ => eprintln!("error: {e}"),
            }
            std::process::exit(1);
        }
    }
}
