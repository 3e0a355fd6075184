//! Run history
//!
//! Append-only JSONL log of run outcomes, read back by diagnostics.

pub mod jsonl;

pub use jsonl::{JsonlLogger, RunOutcome, RunStatus};
