//! # Command-Line Interface
//!
//! The `rma` binary: a thin layer that opens the project, calls one engine
//! operation and renders the result.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Unit | Check-in and lifecycle | `unit add`, `unit move`, `unit history` |
//! | Entry | Checklist work | `entry done`, `entry skip`, `entry insert` |
//! | Status | Workflow graph | `status add`, `status link`, `status close` |
//! | Task | Catalog and templates | `task add`, `task map`, `task place` |
//! | Location | Racks and slots | `location provision`, `location assign` |
//! | Category | Product categories | `category add`, `category list` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Without the flag, the global config's `default_format` applies.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod category;
mod entry;
mod location;
mod output;
mod status;
mod task;
mod unit;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};

use anyhow::Result;

use crate::engine::Engine;
use crate::storage::Project;

/// Opens the engine of the project enclosing the current directory
fn open_engine(output: &Output) -> Result<Engine> {
    let project = Project::open_current()?;
    output.verbose_ctx(
        "project",
        &format!("Using database {}", project.db_path().display()),
    );
    project.engine()
}
