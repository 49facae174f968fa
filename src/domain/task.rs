//! Task catalog entries, status mappings and per-unit checklist entries
//!
//! A [`Task`] is a reusable unit of work with no status affinity. A
//! [`StatusTask`] says "this task applies to this status", and predefined
//! mappings carry a dense 1..N order. A [`ChecklistEntry`] is one task
//! instantiated on one unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::serial::SerialNumber;
use super::status::StatusId;

/// Row id of a catalog task
pub type TaskId = i64;

/// Row id of a checklist entry
pub type EntryId = i64;

/// Result text of an entry nobody has worked on yet
pub const DEFAULT_RESULT: &str = "Action Not Yet Done";

/// A reusable unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Action to perform; names are not unique
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Mapping of a task onto a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTask {
    pub id: i64,
    pub status_id: StatusId,
    pub task_id: TaskId,
    pub task_name: String,

    /// Auto-assigned to every unit entering the status
    pub is_predefined: bool,

    /// Position among the status's predefined tasks (1-based, dense).
    /// Always `None` for non-predefined mappings.
    pub order: Option<u32>,
}

/// How an active entry was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Completed,
    Skipped,
}

impl Resolution {
    /// Tag prefixed onto the result text
    pub fn tag(&self) -> &'static str {
        match self {
            Resolution::Completed => "(Completed)",
            Resolution::Skipped => "(Skipped)",
        }
    }

    /// Builds the stored result text for a closed entry
    pub fn tagged_result(&self, result: Option<&str>) -> String {
        match result.map(str::trim).filter(|r| !r.is_empty()) {
            Some(text) => format!("{} {}", self.tag(), text),
            None => self.tag().to_string(),
        }
    }
}

/// Lifecycle state of a checklist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Active,
    Completed,
    Skipped,
}

impl EntryState {
    pub fn label(&self) -> &'static str {
        match self {
            EntryState::Active => "active",
            EntryState::Completed => "completed",
            EntryState::Skipped => "skipped",
        }
    }
}

/// A task instantiated on one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub id: EntryId,
    pub serial: SerialNumber,
    pub task_id: TaskId,
    pub task_name: String,

    /// Status stay (history row) the entry was created under
    pub history_id: i64,

    pub is_completed: bool,
    pub is_skipped: bool,

    /// Copied from the status mapping at creation time
    pub is_predefined: bool,

    pub result: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Per-unit position (1-based, dense)
    pub order: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChecklistEntry {
    /// Neither completed nor skipped
    pub fn is_active(&self) -> bool {
        !self.is_completed && !self.is_skipped
    }

    pub fn state(&self) -> EntryState {
        if self.is_completed {
            EntryState::Completed
        } else if self.is_skipped {
            EntryState::Skipped
        } else {
            EntryState::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_result_prefixes_text() {
        assert_eq!(
            Resolution::Completed.tagged_result(Some("PSU replaced")),
            "(Completed) PSU replaced"
        );
        assert_eq!(
            Resolution::Skipped.tagged_result(Some("  not needed ")),
            "(Skipped) not needed"
        );
    }

    #[test]
    fn tagged_result_without_text_is_just_the_tag() {
        assert_eq!(Resolution::Completed.tagged_result(None), "(Completed)");
        assert_eq!(Resolution::Skipped.tagged_result(Some("   ")), "(Skipped)");
    }
}
