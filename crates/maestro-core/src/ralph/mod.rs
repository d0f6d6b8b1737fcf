//! The forced-iteration stop gate ("Ralph Wiggum" loop).
//!
//! While engaged, every top-level stop request is turned back until either
//! the iteration budget is spent or the completion sentinel appears.

pub mod machine;
pub mod port;

use chrono::Utc;

use crate::error::CoreError;
use crate::model::{IterationMode, IterationState};

pub use machine::{evaluate, AllowReason, GateDecision, GateEffect, GateState, StopKind};
pub use port::{FileIterationPort, IterationPort};

/// Ties the pure transition function to a persistence port.
pub struct IterationController<P: IterationPort> {
    port: P,
}

impl<P: IterationPort> IterationController<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Engage the gate with a fresh budget, replacing any previous run.
    pub fn init(
        &self,
        max: u32,
        mode: IterationMode,
        features: Vec<String>,
    ) -> Result<IterationState, CoreError> {
        if max == 0 {
            return Err(CoreError::InvalidState(
                "max iterations must be at least 1".into(),
            ));
        }
        let state = IterationState::new(max, mode, features);
        let _guard = self.port.lock()?;
        self.port.activate(&state)?;
        tracing::info!(max, mode = %mode, "Iteration gate engaged");
        Ok(state)
    }

    /// Decide whether a stop event may proceed, and persist the outcome.
    pub fn on_stop(&self, kind: StopKind) -> Result<GateDecision, CoreError> {
        if kind == StopKind::SubagentStop {
            return Ok(GateDecision::Allow(AllowReason::Subagent));
        }
        let _guard = self.port.lock()?;
        let state = self.port.snapshot()?;
        let (decision, effect) = evaluate(state, kind, Utc::now());
        match effect {
            GateEffect::None => {}
            GateEffect::Persist(s) => self.port.persist(&s)?,
            GateEffect::Cleanup => self.port.cleanup()?,
        }
        tracing::debug!(?decision, "Stop gate evaluated");
        Ok(decision)
    }

    /// Signal early completion; the next stop is allowed.
    pub fn complete(&self) -> Result<(), CoreError> {
        self.port.signal_complete()
    }

    /// Disengage immediately.
    pub fn cancel(&self) -> Result<(), CoreError> {
        let _guard = self.port.lock()?;
        self.port.cleanup()
    }

    pub fn status(&self) -> Result<GateState, CoreError> {
        self.port.snapshot()
    }
}
