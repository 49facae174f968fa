//! RMA tracker - returned-unit lifecycle tracking
//!
//! Units are checked in by serial number, worked through a graph of statuses
//! with per-status task checklists, and stored in rack / layer / space slots.
//! The [`engine::Engine`] enforces the rules tying those together; the `rma`
//! binary is a thin CLI over it.

pub mod cli;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod storage;

pub use domain::{EngineError, EngineResult, ErrorKind, NewUnit, SerialNumber, SlotAddress, Unit};
pub use engine::{BatchReport, Engine};
