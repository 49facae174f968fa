//! Batch check-in and relocation
//!
//! Each item runs in its own transaction. A bad item is recorded and the
//! batch moves on.

use tracing::{info, warn};

use super::Engine;
use crate::domain::{EngineError, NewUnit, SlotAddress};

/// Per-item outcome of a batch, keyed by serial
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, EngineError)>,
}

impl BatchReport {
    /// True when no item failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record<T>(&mut self, key: String, outcome: Result<T, EngineError>) {
        match outcome {
            Ok(_) => self.succeeded.push(key),
            Err(err) => {
                warn!(item = %key, error = %err, "batch item failed");
                self.failed.push((key, err));
            }
        }
    }
}

impl Engine {
    /// Checks in every unit it can; see [`Engine::create_unit`]
    pub fn check_in_batch(&self, units: Vec<NewUnit>) -> BatchReport {
        let mut report = BatchReport::default();
        for unit in units {
            let key = unit.serial.trim().to_string();
            let outcome = self.create_unit(unit);
            report.record(key, outcome);
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "batch check-in finished"
        );
        report
    }

    /// Moves every unit it can; see [`Engine::relocate`]
    pub fn relocate_batch(&self, moves: Vec<(String, SlotAddress)>) -> BatchReport {
        let mut report = BatchReport::default();
        for (serial, slot) in moves {
            let outcome = self.relocate(&serial, &slot);
            report.record(serial.trim().to_string(), outcome);
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "batch relocation finished"
        );
        report
    }
}
