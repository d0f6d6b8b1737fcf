//! Transcript capture for Maestro.
//!
//! Finds the host's transcript for the current project, reads whatever was
//! appended since the last checkpoint, classifies it into memory facts and
//! merges them into the project's memory store. Also hosts the lifecycle
//! dispatcher that the `maestro hook` command drives.

pub mod classify;
pub mod compaction;
pub mod digest;
pub mod error;
pub mod lifecycle;
pub mod reader;
pub mod session;
pub mod sync;

pub use error::CaptureError;
pub use lifecycle::{HookContext, HookResponse, LifecycleDispatcher, LifecycleEvent, StartSource};
