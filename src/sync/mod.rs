//! Row synchronization engine.
//!
//! This module provides:
//! - Change detection over the configured watch columns
//! - Write planning over the update columns, with replacement literals
//! - The pass driver that fetches, compares and writes one batch

pub mod types;
pub mod detector;
pub mod planner;
pub mod driver;

pub use types::*;
pub use detector::{detect, has_changed, Detection};
pub use planner::{plan, plan_new_row, PlannedCell, WritePlan};
pub use driver::SyncDriver;
