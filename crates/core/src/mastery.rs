//! Per-learner mastery state and its transition rules.
//!
//! Each (learner, topic) pair moves through a small state machine:
//! `Unclaimed -> Claimed -> {Verified, Struggling}`, with
//! `Struggling -> Verified` reachable later through a passed post-lesson
//! quiz. `claimed` is fixed at onboarding; `verified` and `struggling` only
//! ever grow or trade members between each other.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The learner's mastery record, persisted as a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasteryState {
    /// Self-reported prior knowledge, pending verification.
    pub claimed: BTreeSet<String>,
    /// Mastery confirmed by a passed quiz.
    pub verified: BTreeSet<String>,
    /// Topics where verification or a post-lesson assessment failed.
    pub struggling: BTreeSet<String>,
}

impl MasteryState {
    /// Fresh state at onboarding: claimed topics from learner input, nothing
    /// verified yet.
    pub fn new(claimed: BTreeSet<String>) -> Self {
        Self {
            claimed,
            verified: BTreeSet::new(),
            struggling: BTreeSet::new(),
        }
    }

    /// Applies the outcome of a verification quiz for a claimed topic.
    ///
    /// Pass: `Claimed -> Verified`. Fail: `Claimed -> Struggling`.
    pub fn record_verification(&mut self, topic_id: &str, passed: bool) {
        if passed {
            self.verified.insert(topic_id.to_string());
            self.struggling.remove(topic_id);
        } else {
            self.struggling.insert(topic_id.to_string());
        }
    }

    /// Applies the outcome of a post-lesson quiz.
    ///
    /// Pass: the topic becomes verified and leaves the struggling set
    /// (covering the `Struggling -> Verified` recovery). Fail: the topic is
    /// added to (or kept in) the struggling set.
    pub fn record_lesson_outcome(&mut self, topic_id: &str, passed: bool) {
        if passed {
            self.verified.insert(topic_id.to_string());
            self.struggling.remove(topic_id);
        } else {
            self.struggling.insert(topic_id.to_string());
        }
    }

    /// Onboarding is complete once every claimed topic has been processed
    /// one way or the other.
    pub fn onboarding_complete(&self) -> bool {
        self.verified.len() + self.struggling.len() >= self.claimed.len()
    }

    /// Claimed topics that have been neither verified nor marked struggling.
    pub fn unverified_claims(&self) -> BTreeSet<String> {
        self.claimed
            .iter()
            .filter(|id| !self.verified.contains(*id) && !self.struggling.contains(*id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn verification_pass_moves_claimed_to_verified() {
        let mut state = MasteryState::new(claims(&["a", "b"]));
        state.record_verification("a", true);

        assert!(state.verified.contains("a"));
        assert!(!state.struggling.contains("a"));
        assert_eq!(state.unverified_claims(), claims(&["b"]));
    }

    #[test]
    fn verification_fail_moves_claimed_to_struggling() {
        let mut state = MasteryState::new(claims(&["a"]));
        state.record_verification("a", false);

        assert!(state.struggling.contains("a"));
        assert!(!state.verified.contains("a"));
    }

    #[test]
    fn struggling_recovers_through_a_passed_lesson_quiz() {
        let mut state = MasteryState::new(claims(&["a"]));
        state.record_verification("a", false);
        state.record_lesson_outcome("a", true);

        assert!(state.verified.contains("a"));
        assert!(!state.struggling.contains("a"));
    }

    #[test]
    fn failed_lesson_quiz_marks_struggling() {
        let mut state = MasteryState::new(claims(&[]));
        state.record_lesson_outcome("loops", false);
        assert!(state.struggling.contains("loops"));

        // A later failure keeps it there.
        state.record_lesson_outcome("loops", false);
        assert!(state.struggling.contains("loops"));
    }

    #[test]
    fn onboarding_terminal_condition() {
        let mut state = MasteryState::new(claims(&["a", "b"]));
        assert!(!state.onboarding_complete());

        state.record_verification("a", true);
        assert!(!state.onboarding_complete());

        state.record_verification("b", false);
        assert!(state.onboarding_complete());
    }

    #[test]
    fn empty_claims_complete_immediately() {
        assert!(MasteryState::new(claims(&[])).onboarding_complete());
    }

    #[test]
    fn processed_sets_grow_monotonically() {
        let mut state = MasteryState::new(claims(&["a", "b", "c"]));
        let mut last = 0;
        for (topic, passed) in [("a", true), ("b", false), ("b", true), ("c", true)] {
            state.record_verification(topic, passed);
            let processed = state.verified.len() + state.struggling.len();
            assert!(processed >= last);
            last = processed;
        }
    }

    #[test]
    fn serde_round_trip() {
        let mut state = MasteryState::new(claims(&["a", "b"]));
        state.record_verification("a", true);

        let json = serde_json::to_string(&state).unwrap();
        let back: MasteryState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
