//! Returned units and their classification attributes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::location::SlotAddress;
use super::serial::SerialNumber;
use super::status::StatusId;
use super::task::{EntryState, TaskId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("Invalid priority '{0}': expected normal, hot or zfa")]
    Priority(String),

    #[error("Invalid short test code '{0}': expected P, F12 or F48")]
    ShortTest(String),
}

/// Handling priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Hot,
    Zfa,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Hot => "hot",
            Priority::Zfa => "zfa",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Normal => "Normal",
            Priority::Hot => "Hot",
            Priority::Zfa => "ZFA",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "hot" => Ok(Priority::Hot),
            "zfa" => Ok(Priority::Zfa),
            _ => Err(AttributeError::Priority(s.to_string())),
        }
    }
}

/// Result of the 12V/48V short test done at intake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShortTest {
    #[default]
    #[serde(rename = "P")]
    Pass,
    #[serde(rename = "F12")]
    Fail12V,
    #[serde(rename = "F48")]
    Fail48V,
}

impl ShortTest {
    pub fn code(&self) -> &'static str {
        match self {
            ShortTest::Pass => "P",
            ShortTest::Fail12V => "F12",
            ShortTest::Fail48V => "F48",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShortTest::Pass => "Pass",
            ShortTest::Fail12V => "Fail on 12V",
            ShortTest::Fail48V => "Fail on 48V",
        }
    }
}

impl fmt::Display for ShortTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ShortTest {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P" => Ok(ShortTest::Pass),
            "F12" => Ok(ShortTest::Fail12V),
            "F48" => Ok(ShortTest::Fail48V),
            _ => Err(AttributeError::ShortTest(s.to_string())),
        }
    }
}

/// Which rows a unit query should see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only units that have not been soft-deleted
    #[default]
    Live,
    /// Soft-deleted units too
    IncludeRemoved,
}

/// A product category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Live units in this category
    pub unit_count: u64,
}

/// Input for checking in a new unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUnit {
    /// Raw serial, validated on creation
    pub serial: String,
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub short_test: ShortTest,
    #[serde(default)]
    pub description: String,

    /// Empty slot to check the unit into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SlotAddress>,
}

impl NewUnit {
    pub fn new(serial: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            category: category.into(),
            priority: Priority::default(),
            short_test: ShortTest::default(),
            description: String::new(),
            location: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_short_test(mut self, short_test: ShortTest) -> Self {
        self.short_test = short_test;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: SlotAddress) -> Self {
        self.location = Some(location);
        self
    }
}

/// A physical returned product tracked by serial number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub serial: SerialNumber,
    pub category: String,
    pub priority: Priority,
    pub short_test: ShortTest,
    pub description: String,

    pub status_id: StatusId,
    pub status: String,

    /// `None` means the unit has no active work left under its status
    pub current_task: Option<TaskId>,

    pub location: Option<SlotAddress>,

    pub is_removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a unit sits and what state it is in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    pub serial: SerialNumber,
    pub status: String,
    pub location: Option<SlotAddress>,
}

/// One resolved-or-not checklist line inside a history stay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task: String,
    pub state: EntryState,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One status the unit has entered, with the work done under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStay {
    pub id: i64,
    pub status: String,
    pub changed_at: DateTime<Utc>,
    pub tasks: Vec<TaskSummary>,
}

impl StatusStay {
    /// One-line rendering: `Status: task - is completed - Result: ... | ...`
    pub fn summary_line(&self) -> String {
        let mut line = format!("{}:", self.status);
        for task in &self.tasks {
            line.push_str(&format!(
                " {} - is {} - Result: {}",
                task.task,
                task.state.label(),
                task.result
            ));
            if let Some(note) = &task.note {
                line.push_str(&format!(" - Note: {}", note));
            }
            line.push_str(" |");
        }
        line
    }
}
