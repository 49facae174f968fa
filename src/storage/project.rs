//! Project management
//!
//! Handles project initialization and opens the engine over the project's
//! database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::PROJECT_DIR;
use super::{Config, Database};
use crate::engine::Engine;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in an rma project. Run 'rma init' first.")]
    NotInProject,
}

/// An RMA tracker project: a directory holding `.rma/`
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(PROJECT_DIR).is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a project at the given path (idempotent)
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let rma_dir = root.join(PROJECT_DIR);

        fs::create_dir_all(&rma_dir).with_context(|| {
            format!("Failed to create {} directory: {}", PROJECT_DIR, rma_dir.display())
        })?;

        let config_path = rma_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# RMA tracker configuration

[engine]
# Status every newly checked-in unit enters
initial_status = "RMA Sorting"

[database]
# Milliseconds a writer waits for a concurrent writer
busy_timeout_ms = 5000

[logging]
# Overridden by the RMA_LOG environment variable
level = "warn"
json = false
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = rma_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = "# SQLite write-ahead log files\nrma.db-wal\nrma.db-shm\n";
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        let project = Self::open(root)?;

        // Create the database and schema now so init fails loudly on a bad path
        Database::open(&project.db_path(), &project.config.project.database)?;

        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .rma directory path
    pub fn rma_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Returns the SQLite database path
    pub fn db_path(&self) -> PathBuf {
        self.rma_dir().join("rma.db")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the lifecycle engine over this project's database
    pub fn engine(&self) -> Result<Engine> {
        let db = Database::open(&self.db_path(), &self.config.project.database)?;
        Ok(Engine::new(db, self.config.project.engine.clone()))
    }
}
