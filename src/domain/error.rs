//! Engine error taxonomy
//!
//! Every engine operation fails with an [`EngineError`]. Callers that only
//! care about the broad class (e.g. to pick an HTTP status or an exit code)
//! use [`EngineError::kind`].

use thiserror::Error;

use super::location::SlotAddress;

/// Broad failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input
    Validation,
    /// Collides with existing state
    Conflict,
    /// Current state forbids the operation
    PreconditionFailed,
    /// Referenced entity is missing
    NotFound,
    /// Storage failure
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    // Validation
    #[error("Serial number must be exactly 13 digits, got '{0}'")]
    InvalidSerial(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Predefined task mappings need an order")]
    MissingOrder,

    #[error("Order {order} is out of range: expected 1..={max}")]
    InvalidOrder { order: u32, max: u32 },

    #[error("Cannot insert at position {position}: expected {min}..={max}")]
    InvalidPosition { position: u32, min: u32, max: u32 },

    #[error("Rack needs at least one layer and one space per layer, and at most 10000 slots")]
    InvalidRackShape,

    // Conflict
    #[error("A unit with serial {0} already exists")]
    DuplicateSerial(String),

    #[error("Status '{0}' already exists")]
    DuplicateStatusName(String),

    #[error("Transition {from} -> {to} already exists")]
    DuplicateTransition { from: String, to: String },

    #[error("Task {task} is already mapped to status '{status}'")]
    DuplicateMapping { status: String, task: String },

    #[error("Task '{task}' is already active on unit {serial}")]
    DuplicateActiveTask { serial: String, task: String },

    #[error("Category '{0}' already exists")]
    DuplicateCategory(String),

    #[error("Location {0} already exists")]
    DuplicateLocation(SlotAddress),

    #[error("Location {location} is occupied by unit {occupant}")]
    LocationOccupied {
        location: SlotAddress,
        occupant: String,
    },

    #[error("Unit {serial} already holds location {location}; release it first")]
    UnitAlreadyLocated {
        serial: String,
        location: SlotAddress,
    },

    // Precondition
    #[error("Cannot create a transition from closed status '{0}'")]
    InvalidTransition(String),

    #[error("Status '{to}' is not reachable from '{from}'")]
    UnreachableStatus { from: String, to: String },

    #[error(
        "Unit {serial} still has outstanding tasks under '{status}': {}",
        .tasks.join(", ")
    )]
    OutstandingTasks {
        serial: String,
        status: String,
        tasks: Vec<String>,
    },

    #[error("Checklist entry {0} is already completed or skipped")]
    AlreadyResolved(i64),

    #[error("Status '{0}' is still referenced by units or task mappings")]
    StatusInUse(String),

    #[error("Task {task} under status '{status}' still has checklist entries")]
    MappingInUse { status: String, task: String },

    #[error("Task {0} is still referenced by status mappings or checklists")]
    TaskInUse(i64),

    #[error("Category '{0}' still has units")]
    CategoryInUse(String),

    #[error("{count} location(s) in {target} are occupied")]
    LocationsOccupied { target: String, count: u64 },

    // Not found
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Status not found: {0}")]
    StatusNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Task {task} is not mapped to status '{status}'")]
    MappingNotFound { status: String, task: String },

    #[error("Checklist entry not found: {0}")]
    EntryNotFound(i64),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    // Internal
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;

        match self {
            InvalidSerial(_)
            | EmptyField(_)
            | MissingOrder
            | InvalidOrder { .. }
            | InvalidPosition { .. }
            | InvalidRackShape => ErrorKind::Validation,

            DuplicateSerial(_)
            | DuplicateStatusName(_)
            | DuplicateTransition { .. }
            | DuplicateMapping { .. }
            | DuplicateActiveTask { .. }
            | DuplicateCategory(_)
            | DuplicateLocation(_)
            | LocationOccupied { .. }
            | UnitAlreadyLocated { .. } => ErrorKind::Conflict,

            InvalidTransition(_)
            | UnreachableStatus { .. }
            | OutstandingTasks { .. }
            | AlreadyResolved(_)
            | StatusInUse(_)
            | MappingInUse { .. }
            | TaskInUse(_)
            | CategoryInUse(_)
            | LocationsOccupied { .. } => ErrorKind::PreconditionFailed,

            UnitNotFound(_)
            | StatusNotFound(_)
            | TaskNotFound(_)
            | MappingNotFound { .. }
            | EntryNotFound(_)
            | CategoryNotFound(_)
            | LocationNotFound(_) => ErrorKind::NotFound,

            Storage(err) if is_busy(err) => ErrorKind::Conflict,
            Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Another writer held the database past the busy timeout
fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            EngineError::InvalidSerial("1".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::DuplicateSerial("1234567890123".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            EngineError::InvalidTransition("Scrapped".into()).kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(EngineError::TaskNotFound(9).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn outstanding_tasks_message_names_tasks() {
        let err = EngineError::OutstandingTasks {
            serial: "1234567890123".into(),
            status: "RMA Sorting".into(),
            tasks: vec!["Inspect".into(), "Photograph".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unit 1234567890123 still has outstanding tasks under 'RMA Sorting': Inspect, Photograph"
        );
    }
}
