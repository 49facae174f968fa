//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{category, entry, location, status, task, unit};
use crate::logging;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "rma")]
#[command(author, version, about = "Track returned units through sorting, repair and storage")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config's default_format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new RMA tracker project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Check in units and move them through the workflow
    #[command(subcommand)]
    Unit(unit::UnitCommands),

    /// Work a unit's checklist entries
    #[command(subcommand)]
    Entry(entry::EntryCommands),

    /// Manage statuses and transitions
    #[command(subcommand)]
    Status(status::StatusCommands),

    /// Manage the task catalog and status templates
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Manage racks and slots
    #[command(subcommand)]
    Location(location::LocationCommands),

    /// Manage product categories
    #[command(subcommand)]
    Category(category::CategoryCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    logging::init(&config.project.logging, cli.verbose);

    let format = cli
        .format
        .unwrap_or_else(|| config.global.default_format.into());
    let output = Output::new(format, cli.verbose);

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Database at: {}", project.db_path().display()),
            );
            output.success(&format!(
                "Initialized RMA tracker at {}",
                project.root().display()
            ));
        }

        Commands::Unit(cmd) => unit::run(cmd, &output)?,
        Commands::Entry(cmd) => entry::run(cmd, &output)?,
        Commands::Status(cmd) => status::run(cmd, &output)?,
        Commands::Task(cmd) => task::run(cmd, &output)?,
        Commands::Location(cmd) => location::run(cmd, &output)?,
        Commands::Category(cmd) => category::run(cmd, &output)?,
    }

    Ok(())
}
