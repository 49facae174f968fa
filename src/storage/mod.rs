//! # Storage Layer
//!
//! SQLite persistence for the RMA tracker.
//!
//! ## Layout
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Units, statuses, tasks, slots | SQLite | `.rma/rma.db` |
//! | Config | TOML | `.rma/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`Database`] serializes writers with `BEGIN IMMEDIATE` transactions
//! - WAL journal mode lets readers run alongside a writer
//! - Schema constraints back every engine-level uniqueness rule
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for a tracker directory
//! - [`Database`] - Transactional access to the SQLite file
//! - [`Config`] - Project and global configuration

mod config;
mod database;
mod project;
mod schema;

pub use config::{
    Config, ConfigError, DatabaseConfig, EngineConfig, GlobalConfig, LoggingConfig, OutputFormat,
    ProjectConfig, DEFAULT_INITIAL_STATUS, PROJECT_DIR,
};
pub use database::Database;
pub use project::{Project, ProjectError};
pub use schema::SCHEMA_VERSION;
