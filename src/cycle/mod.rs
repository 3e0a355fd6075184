//! Cycle management
//!
//! This module handles cycle boundaries, cycle records and the
//! lifecycle transitions driven by the cycle manager.

pub mod boundary;
pub mod manager;
pub mod model;

pub use boundary::{resolve_cycle_end_date, CycleDates};
pub use manager::{CycleConflict, CycleManager};
pub use model::{Cycle, CycleStatus};
