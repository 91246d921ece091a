//! Transcript validation stage.
//!
//! Checks tool-call/result pairing after lossy stages and logs anomalies.
//! Never transforms and never fails the pipeline.

use chat_core::{ContentUnit, Conversation, ToolCallState};

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::CompactionStage;

/// Stage that audits the transcript shape without modifying it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateTranscript;

impl ValidateTranscript {
    pub fn new() -> Self {
        Self
    }
}

impl CompactionStage for ValidateTranscript {
    fn name(&self) -> &'static str {
        "validate_transcript"
    }

    fn apply(
        &self,
        conversation: &Conversation,
        _budget: &CompactionBudget,
        _estimator: &CostEstimator<'_>,
    ) -> Result<Conversation, StageError> {
        for (index, turn) in conversation.iter().enumerate() {
            for unit in &turn.content {
                if let ContentUnit::ToolCall(call) = unit {
                    if call.state == ToolCallState::Completed && call.result.is_none() {
                        tracing::warn!(
                            turn = index,
                            tool = %call.tool_name,
                            "Completed tool call is missing its result"
                        );
                    }
                }
            }
        }

        Ok(conversation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderError, TokenEncoder};
    use chat_core::{Role, Turn};

    struct FixedEncoder;

    impl TokenEncoder for FixedEncoder {
        fn encode_len(&self, text: &str) -> Result<u32, EncoderError> {
            Ok((text.chars().count() as u32).div_ceil(4))
        }
    }

    #[test]
    fn returns_input_unchanged() {
        let estimator = CostEstimator::with_encoder(Box::new(FixedEncoder));
        let conversation = Conversation::from_turns(vec![Turn::text(Role::User, "hi")]);
        let budget = CompactionBudget::default();

        let result = ValidateTranscript::new()
            .apply(&conversation, &budget, &estimator)
            .unwrap();

        assert_eq!(result, conversation);
    }
}
