//! Domain models for the RMA tracker
//!
//! Plain data types and validation, without any I/O concerns.

mod error;
mod location;
mod serial;
mod status;
mod task;
mod unit;

pub use error::{EngineError, EngineResult, ErrorKind};
pub use location::{Location, SlotAddress};
pub use serial::{SerialError, SerialNumber, SERIAL_LEN};
pub use status::{Status, StatusId, StatusTransition};
pub use task::{
    ChecklistEntry, EntryId, EntryState, Resolution, StatusTask, Task, TaskId, DEFAULT_RESULT,
};
pub use unit::{
    AttributeError, Category, NewUnit, Priority, ShortTest, StatusStay, TaskSummary, Unit,
    UnitPlacement, Visibility,
};
