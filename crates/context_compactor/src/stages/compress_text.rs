//! Verbose-text compression stage.

use chat_core::{ContentUnit, Conversation, Turn};

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::{truncate_with_marker, CompactionStage};

/// Default ceiling above which a text unit is compressed.
const DEFAULT_MAX_CHARS: usize = 2000;
/// Default prefix length kept when compressing.
const DEFAULT_KEEP_CHARS: usize = 1000;

/// Stage that truncates oversized text units to a prefix with a truncation
/// marker.
#[derive(Debug, Clone, Copy)]
pub struct CompressVerboseText {
    max_chars: usize,
    keep_chars: usize,
}

impl CompressVerboseText {
    pub fn new(max_chars: usize, keep_chars: usize) -> Self {
        Self {
            max_chars,
            keep_chars: keep_chars.min(max_chars),
        }
    }
}

impl Default for CompressVerboseText {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS, DEFAULT_KEEP_CHARS)
    }
}

impl CompactionStage for CompressVerboseText {
    fn name(&self) -> &'static str {
        "compress_verbose_text"
    }

    fn apply(
        &self,
        conversation: &Conversation,
        budget: &CompactionBudget,
        _estimator: &CostEstimator<'_>,
    ) -> Result<Conversation, StageError> {
        let protected_start = budget.protected_start(conversation.len());

        let turns = conversation
            .iter()
            .enumerate()
            .map(|(index, turn)| {
                if index >= protected_start {
                    return turn.clone();
                }

                let content = turn
                    .content
                    .iter()
                    .map(|unit| match unit {
                        ContentUnit::Text { text }
                            if text.chars().count() > self.max_chars =>
                        {
                            ContentUnit::text(truncate_with_marker(text, self.keep_chars))
                        }
                        other => other.clone(),
                    })
                    .collect();

                Turn::with_id(turn.id.clone(), turn.role, content, turn.created_at)
            })
            .collect();

        Ok(Conversation::from_turns(turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderError, TokenEncoder};
    use chat_core::Role;

    struct FixedEncoder;

    impl TokenEncoder for FixedEncoder {
        fn encode_len(&self, text: &str) -> Result<u32, EncoderError> {
            Ok((text.chars().count() as u32).div_ceil(4))
        }
    }

    fn estimator() -> CostEstimator<'static> {
        CostEstimator::with_encoder(Box::new(FixedEncoder))
    }

    #[test]
    fn compresses_long_text_outside_window() {
        let conversation = Conversation::from_turns(vec![
            Turn::text(Role::Assistant, "z".repeat(3_000)),
            Turn::text(Role::User, "recent"),
        ]);
        let budget = CompactionBudget::new(1_000, 800, 1);

        let result = CompressVerboseText::default()
            .apply(&conversation, &budget, &estimator())
            .unwrap();

        let text = result.turns[0].as_text();
        assert!(text.ends_with("...[truncated]"));
        assert!(text.chars().count() < 1_100);
        assert_eq!(result.turns[1], conversation.turns[1]);
    }

    #[test]
    fn short_text_untouched_and_idempotent() {
        let conversation = Conversation::from_turns(vec![
            Turn::text(Role::Assistant, "short answer"),
            Turn::text(Role::User, "recent"),
        ]);
        let budget = CompactionBudget::new(1_000, 800, 1);
        let stage = CompressVerboseText::default();

        let once = stage.apply(&conversation, &budget, &estimator()).unwrap();
        assert_eq!(once, conversation);

        let twice = stage.apply(&once, &budget, &estimator()).unwrap();
        assert_eq!(once, twice);
    }
}
