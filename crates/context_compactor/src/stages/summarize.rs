//! Old-turn summarization stage.
//!
//! Collapses everything outside the protected window into a single
//! synthetic system turn. The placeholder is deterministic: strategies that
//! run this stage accept losing fine-grained old context, and the engine
//! makes no abstractive-summary quality guarantees.

use chat_core::{ContentUnit, Conversation, Role, Turn};

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::CompactionStage;

/// Prefix identifying a synthetic summary turn.
pub const SUMMARY_PREFIX: &str = "[history summary:";

/// Stage that replaces all non-protected turns with one summary turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarizeOldTurns;

impl SummarizeOldTurns {
    pub fn new() -> Self {
        Self
    }
}

impl CompactionStage for SummarizeOldTurns {
    fn name(&self) -> &'static str {
        "summarize_old_turns"
    }

    fn apply(
        &self,
        conversation: &Conversation,
        budget: &CompactionBudget,
        _estimator: &CostEstimator<'_>,
    ) -> Result<Conversation, StageError> {
        let protected_start = budget.protected_start(conversation.len());
        if protected_start == 0 {
            return Ok(conversation.clone());
        }

        let old_turns = &conversation.turns[..protected_start];

        // Re-applying to our own output is a no-op.
        if old_turns.len() == 1 && is_summary_turn(&old_turns[0]) {
            return Ok(conversation.clone());
        }

        let oldest = &old_turns[0];
        let summary = Turn::with_id(
            format!("summary-{}", oldest.id),
            Role::System,
            vec![ContentUnit::text(format!(
                "{SUMMARY_PREFIX} {} prior turns]",
                old_turns.len()
            ))],
            oldest.created_at,
        );

        let mut turns = Vec::with_capacity(conversation.len() - protected_start + 1);
        turns.push(summary);
        turns.extend_from_slice(&conversation.turns[protected_start..]);

        tracing::debug!(collapsed = protected_start, "Summarized old turns");

        Ok(Conversation::from_turns(turns))
    }
}

fn is_summary_turn(turn: &Turn) -> bool {
    turn.role == Role::System && turn.as_text().starts_with(SUMMARY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderError, TokenEncoder};

    struct FixedEncoder;

    impl TokenEncoder for FixedEncoder {
        fn encode_len(&self, text: &str) -> Result<u32, EncoderError> {
            Ok((text.chars().count() as u32).div_ceil(4))
        }
    }

    fn estimator() -> CostEstimator<'static> {
        CostEstimator::with_encoder(Box::new(FixedEncoder))
    }

    fn conversation(n: usize) -> Conversation {
        Conversation::from_turns(
            (0..n)
                .map(|i| Turn::text(Role::User, format!("turn {i}")))
                .collect(),
        )
    }

    #[test]
    fn collapses_old_turns_into_summary() {
        let input = conversation(10);
        let budget = CompactionBudget::new(1_000, 800, 3);

        let result = SummarizeOldTurns::new()
            .apply(&input, &budget, &estimator())
            .unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.turns[0].role, Role::System);
        assert_eq!(result.turns[0].as_text(), "[history summary: 7 prior turns]");
        assert_eq!(&result.turns[1..], &input.turns[7..]);
    }

    #[test]
    fn idempotent() {
        let input = conversation(10);
        let budget = CompactionBudget::new(1_000, 800, 3);
        let stage = SummarizeOldTurns::new();

        let once = stage.apply(&input, &budget, &estimator()).unwrap();
        let twice = stage.apply(&once, &budget, &estimator()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn fully_protected_conversation_unchanged() {
        let input = conversation(3);
        let budget = CompactionBudget::new(1_000, 800, 5);

        let result = SummarizeOldTurns::new()
            .apply(&input, &budget, &estimator())
            .unwrap();

        assert_eq!(result, input);
    }

    #[test]
    fn deterministic_across_runs() {
        let input = conversation(6);
        let budget = CompactionBudget::new(1_000, 800, 2);
        let stage = SummarizeOldTurns::new();

        let a = stage.apply(&input, &budget, &estimator()).unwrap();
        let b = stage.apply(&input, &budget, &estimator()).unwrap();

        assert_eq!(a, b);
    }
}
