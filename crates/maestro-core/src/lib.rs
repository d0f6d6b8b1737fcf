//! Core of Maestro: the data model shared by every lifecycle hook, the
//! persistent memory store (`brain.jsonl`), the per-file sync checkpoints and
//! the forced-iteration stop gate.
//!
//! Everything here is synchronous and filesystem-backed. Each hook invocation
//! is short-lived; cross-invocation state lives in the project's `.maestro/`
//! directory and is always rewritten whole through an atomic rename.

pub mod config;
pub mod error;
pub mod model;
pub mod paths;
pub mod ralph;
pub mod storage;
pub mod text;

pub use error::CoreError;
