//! Fallback recovery state machine.
//!
//! Tracks consecutive unrecognized turns per session and breaks
//! classification loops: a couple of misses get best-effort suggestions,
//! a third forces the guided-help menu regardless of what the classifiers
//! said, and the streak resets. Any recognized intent resets the streak
//! immediately. This policy is evaluated before the rest of the pipeline
//! and can override the resolved intent entirely.

use serde::{Deserialize, Serialize};

/// What the recovery machine wants this turn to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Not in a fallback loop; continue the normal pipeline
    Continue,
    /// 1–2 consecutive misses: reply with best-effort suggestions
    Suggest,
    /// Streak reached the threshold: force the guided-help menu
    GuidedHelp,
}

/// Loop-breaking policy over the consecutive-fallback counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackRecovery {
    /// Consecutive fallbacks that force the guided-help menu
    pub guided_help_threshold: u32,
}

impl FallbackRecovery {
    /// Create with the given escalation threshold
    pub fn new(guided_help_threshold: u32) -> Self {
        Self {
            guided_help_threshold: guided_help_threshold.max(1),
        }
    }

    /// Evaluate one turn.
    ///
    /// Takes the streak stored before this turn and whether this turn
    /// resolved to `fallback`; returns the action and the streak value to
    /// store. The guided-help escalation resets the counter.
    pub fn evaluate(&self, prior_streak: u32, is_fallback: bool) -> (RecoveryAction, u32) {
        if !is_fallback {
            return (RecoveryAction::Continue, 0);
        }
        let streak = prior_streak.saturating_add(1);
        if streak >= self.guided_help_threshold {
            (RecoveryAction::GuidedHelp, 0)
        } else {
            (RecoveryAction::Suggest, streak)
        }
    }
}

impl Default for FallbackRecovery {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_intent_resets() {
        let recovery = FallbackRecovery::default();
        assert_eq!(recovery.evaluate(2, false), (RecoveryAction::Continue, 0));
        assert_eq!(recovery.evaluate(0, false), (RecoveryAction::Continue, 0));
    }

    #[test]
    fn test_three_strikes_forces_guided_help() {
        let recovery = FallbackRecovery::default();
        let (a1, s1) = recovery.evaluate(0, true);
        assert_eq!(a1, RecoveryAction::Suggest);
        assert_eq!(s1, 1);

        let (a2, s2) = recovery.evaluate(s1, true);
        assert_eq!(a2, RecoveryAction::Suggest);
        assert_eq!(s2, 2);

        let (a3, s3) = recovery.evaluate(s2, true);
        assert_eq!(a3, RecoveryAction::GuidedHelp);
        assert_eq!(s3, 0, "guided help resets the counter");
    }

    #[test]
    fn test_streak_restarts_after_menu() {
        let recovery = FallbackRecovery::default();
        let (_, after_menu) = recovery.evaluate(2, true);
        assert_eq!(after_menu, 0);
        // The next miss starts a fresh streak, not another menu
        assert_eq!(recovery.evaluate(after_menu, true), (RecoveryAction::Suggest, 1));
    }

    #[test]
    fn test_success_mid_streak_resets() {
        let recovery = FallbackRecovery::default();
        let (_, s) = recovery.evaluate(1, false);
        assert_eq!(s, 0);
        assert_eq!(recovery.evaluate(s, true), (RecoveryAction::Suggest, 1));
    }

    #[test]
    fn test_threshold_floor() {
        // A zero threshold would loop the menu forever; clamp to 1
        let recovery = FallbackRecovery::new(0);
        assert_eq!(recovery.evaluate(0, true).0, RecoveryAction::GuidedHelp);
    }
}
