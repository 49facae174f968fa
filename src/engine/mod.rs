//! # Lifecycle Engine
//!
//! Everything that changes a unit's status, checklist or slot goes through
//! [`Engine`]. Each public method runs in exactly one database transaction,
//! so a failed operation leaves no trace.
//!
//! ## Components
//!
//! | Module | Concern |
//! |--------|---------|
//! | `status_graph` | Statuses and allowed transitions |
//! | `catalog` | Tasks and per-status predefined templates |
//! | `checklist` | Per-unit task entries and the current-task pointer |
//! | `locations` | Rack / layer / space slots and occupancy |
//! | `lifecycle` | Unit creation and status changes |
//! | `categories` | Product categories |
//! | `bulk` | Batch check-in and relocation |
//!
//! Components share `pub(crate)` helpers that take a plain `&Connection`,
//! so an orchestrating operation (e.g. a status change) can call into
//! several of them inside its own transaction.

mod bulk;
mod catalog;
mod categories;
mod checklist;
mod lifecycle;
mod locations;
mod status_graph;

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::Row;

pub use bulk::BatchReport;

use crate::domain::SerialNumber;
use crate::storage::{Database, EngineConfig};

/// The RMA unit lifecycle engine
pub struct Engine {
    db: Database,
    config: EngineConfig,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Engine over a private in-memory database with default settings
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, EngineConfig::default()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Reads a serial column, rejecting rows that somehow hold a malformed one
pub(crate) fn serial_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<SerialNumber> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
