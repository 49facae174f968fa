//! Workflow statuses and the transitions between them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of a status
pub type StatusId = i64;

/// A named stage in the repair/sorting workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,

    /// Unique, human-readable name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Terminal flag: a closed status has no outgoing transitions
    pub is_closed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An allowed `from -> to` edge in the status graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub id: i64,
    pub from_status: StatusId,
    pub to_status: StatusId,
    pub created_at: DateTime<Utc>,
}
