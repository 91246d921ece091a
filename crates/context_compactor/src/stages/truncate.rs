//! Whole-turn truncation stage.
//!
//! Removes one non-protected turn at a time, re-measuring after each
//! removal, until the target is met or only protected turns remain.
//! Observation-only turns (pure screenshot exchanges) are removed before
//! any dialogue turn to preserve conversational continuity over tool
//! telemetry.

use chat_core::Conversation;

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::CompactionStage;

/// Stage that drops whole turns until the budget is satisfied.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncateToTarget;

impl TruncateToTarget {
    pub fn new() -> Self {
        Self
    }

    /// Pick the removal victim among the non-protected turns: the oldest
    /// observation-only turn if one exists, otherwise the oldest turn.
    fn pick_victim(conversation: &Conversation, protected_start: usize) -> usize {
        conversation.turns[..protected_start]
            .iter()
            .position(|turn| turn.is_observation_only())
            .unwrap_or(0)
    }
}

impl CompactionStage for TruncateToTarget {
    fn name(&self) -> &'static str {
        "truncate_to_target"
    }

    fn apply(
        &self,
        conversation: &Conversation,
        budget: &CompactionBudget,
        estimator: &CostEstimator<'_>,
    ) -> Result<Conversation, StageError> {
        let mut current = conversation.clone();
        let mut removed = 0usize;

        // Bounded by the number of non-protected turns at entry.
        loop {
            let breakdown = estimator.estimate(&current, budget.target_tokens);
            if !breakdown.needs_optimization {
                break;
            }

            let protected_start = budget.protected_start(current.len());
            if protected_start == 0 {
                break;
            }

            let victim = Self::pick_victim(&current, protected_start);
            current.turns.remove(victim);
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(removed, "Truncated turns to reach target");
        }

        Ok(current)
    }
}
