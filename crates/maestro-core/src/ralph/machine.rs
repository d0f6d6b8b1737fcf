//! Pure transition logic for the stop gate.

use chrono::{DateTime, Utc};

use crate::model::IterationState;

/// Controller state as observed on disk at the start of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    /// No active sentinel: the gate is disengaged.
    Inactive,
    /// Active sentinel and readable state.
    Active(IterationState),
    /// Active, and the completion sentinel has been dropped.
    CompletionSignaled(IterationState),
    /// Active sentinel present but the state file is missing or unreadable.
    Orphaned,
}

/// Which stop event the host fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// The top-level assistant wants to end its turn.
    Stop,
    /// A nested helper finished; never gated.
    SubagentStop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowReason {
    Inactive,
    Subagent,
    /// The completion sentinel was present.
    CompletionSignaled { current: u32, max: u32 },
    /// `current` passed `max`.
    Exhausted { current: u32, max: u32 },
    /// State could not be read; fail open.
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(AllowReason),
    Block {
        current: u32,
        max: u32,
        message: String,
    },
}

impl GateDecision {
    pub fn is_block(&self) -> bool {
        matches!(self, GateDecision::Block { .. })
    }

    /// True when the stop ends an iteration run (naturally or by sentinel).
    pub fn completed(&self) -> bool {
        matches!(
            self,
            GateDecision::Allow(
                AllowReason::CompletionSignaled { .. } | AllowReason::Exhausted { .. }
            )
        )
    }
}

/// Side effect the persistence layer must apply after an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GateEffect {
    None,
    Persist(IterationState),
    /// Remove the state file and both sentinels.
    Cleanup,
}

/// Evaluate one stop event.
pub fn evaluate(state: GateState, kind: StopKind, now: DateTime<Utc>) -> (GateDecision, GateEffect) {
    if kind == StopKind::SubagentStop {
        return (GateDecision::Allow(AllowReason::Subagent), GateEffect::None);
    }

    match state {
        GateState::Inactive => (GateDecision::Allow(AllowReason::Inactive), GateEffect::None),
        GateState::Orphaned => (GateDecision::Allow(AllowReason::Orphaned), GateEffect::Cleanup),
        GateState::CompletionSignaled(s) => (
            GateDecision::Allow(AllowReason::CompletionSignaled {
                current: s.current,
                max: s.max,
            }),
            GateEffect::Cleanup,
        ),
        GateState::Active(mut s) => {
            s.current = s.current.saturating_add(1);
            s.last_update = now;
            if s.current <= s.max {
                let message = block_message(&s);
                let decision = GateDecision::Block {
                    current: s.current,
                    max: s.max,
                    message,
                };
                (decision, GateEffect::Persist(s))
            } else {
                (
                    GateDecision::Allow(AllowReason::Exhausted {
                        current: s.current,
                        max: s.max,
                    }),
                    GateEffect::Cleanup,
                )
            }
        }
    }
}

fn block_message(s: &IterationState) -> String {
    let mut msg = format!(
        "Iteration {}/{} ({} mode). Do not stop yet: review the work, fix what is broken and keep improving.",
        s.current, s.max, s.mode
    );
    if !s.features.is_empty() {
        msg.push_str(&format!(" Focus: {}.", s.features.join(", ")));
    }
    msg.push_str(" When everything is genuinely done, run `maestro ralph complete`.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IterationMode;

    fn active(max: u32) -> GateState {
        GateState::Active(IterationState::new(max, IterationMode::Quality, vec![]))
    }

    /// Drive the machine the way the file port would.
    fn run(mut state: GateState, kind: StopKind) -> (GateDecision, GateState) {
        let (decision, effect) = evaluate(state.clone(), kind, Utc::now());
        state = match effect {
            GateEffect::None => state,
            GateEffect::Persist(s) => GateState::Active(s),
            GateEffect::Cleanup => GateState::Inactive,
        };
        (decision, state)
    }

    #[test]
    fn test_inactive_allows() {
        let (d, e) = evaluate(GateState::Inactive, StopKind::Stop, Utc::now());
        assert_eq!(d, GateDecision::Allow(AllowReason::Inactive));
        assert_eq!(e, GateEffect::None);
        assert!(!d.completed());
    }

    #[test]
    fn test_gate_arithmetic_max_three() {
        let mut state = active(3);
        for expected in 1..=3 {
            let (decision, next) = run(state, StopKind::Stop);
            match decision {
                GateDecision::Block { current, max, .. } => {
                    assert_eq!(current, expected);
                    assert_eq!(max, 3);
                }
                other => panic!("expected block, got {other:?}"),
            }
            state = next;
        }
        let (decision, next) = run(state, StopKind::Stop);
        assert_eq!(
            decision,
            GateDecision::Allow(AllowReason::Exhausted { current: 4, max: 3 })
        );
        assert!(decision.completed());
        assert_eq!(next, GateState::Inactive);
    }

    #[test]
    fn test_completion_sentinel_does_not_increment() {
        let s = IterationState::new(3, IterationMode::Features, vec![]);
        let (d, e) = evaluate(GateState::CompletionSignaled(s), StopKind::Stop, Utc::now());
        assert_eq!(
            d,
            GateDecision::Allow(AllowReason::CompletionSignaled { current: 0, max: 3 })
        );
        assert!(d.completed());
        assert_eq!(e, GateEffect::Cleanup);
    }

    #[test]
    fn test_subagent_stop_always_allowed() {
        for state in [
            GateState::Inactive,
            active(1),
            active(100),
            GateState::Orphaned,
        ] {
            let (d, e) = evaluate(state, StopKind::SubagentStop, Utc::now());
            assert_eq!(d, GateDecision::Allow(AllowReason::Subagent));
            assert_eq!(e, GateEffect::None);
        }
    }

    #[test]
    fn test_orphaned_fails_open_and_cleans() {
        let (d, e) = evaluate(GateState::Orphaned, StopKind::Stop, Utc::now());
        assert_eq!(d, GateDecision::Allow(AllowReason::Orphaned));
        assert_eq!(e, GateEffect::Cleanup);
    }

    #[test]
    fn test_counter_at_limit_does_not_wrap() {
        let mut s = IterationState::new(5, IterationMode::Quality, vec![]);
        s.current = u32::MAX;
        let (d, e) = evaluate(GateState::Active(s), StopKind::Stop, Utc::now());
        assert_eq!(
            d,
            GateDecision::Allow(AllowReason::Exhausted {
                current: u32::MAX,
                max: 5
            })
        );
        assert_eq!(e, GateEffect::Cleanup);
    }

    #[test]
    fn test_block_message_mentions_features() {
        let s = IterationState::new(2, IterationMode::Features, vec!["auth".into(), "billing".into()]);
        let (d, _) = evaluate(GateState::Active(s), StopKind::Stop, Utc::now());
        let GateDecision::Block { message, .. } = d else {
            panic!("expected block");
        };
        assert!(message.contains("Iteration 1/2"));
        assert!(message.contains("auth, billing"));
    }
}
