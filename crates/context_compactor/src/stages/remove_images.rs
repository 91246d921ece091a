//! Image removal stage.
//!
//! Replaces image tool results with text markers instead of deleting the
//! carrying units: the model transcript format expects every tool call to
//! keep its call/result pairing, and the marker preserves the fact that a
//! screenshot was taken.

use chat_core::{ContentUnit, Conversation, ToolCallState, ToolResult, Turn};

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::CompactionStage;

/// Marker substituted for a redacted image result.
pub const IMAGE_REDACTED_MARKER: &str = "[screenshot redacted to save tokens]";

/// Marker substituted for a pending image-producing request.
pub const IMAGE_REQUEST_REDACTED_MARKER: &str =
    "[pending screenshot request redacted to save tokens]";

/// Which images outside the protected window are eligible for redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScope {
    /// Every image outside the protected window
    All,
    /// Only images older than twice the protected window
    OldOnly,
    /// Every image outside the protected window, sparing the newest one
    /// when it is recent enough (within twice the protected window) to
    /// still describe the current screen
    RedundantOnly,
}

/// Stage that redacts image payloads from tool results.
#[derive(Debug, Clone, Copy)]
pub struct RemoveImages {
    scope: ImageScope,
}

impl RemoveImages {
    pub fn new(scope: ImageScope) -> Self {
        Self { scope }
    }

    pub fn all() -> Self {
        Self::new(ImageScope::All)
    }

    pub fn old_only() -> Self {
        Self::new(ImageScope::OldOnly)
    }

    pub fn redundant_only() -> Self {
        Self::new(ImageScope::RedundantOnly)
    }

    /// Exclusive upper bound of the turn range eligible for redaction.
    fn redaction_end(&self, turn_count: usize, budget: &CompactionBudget) -> usize {
        let protected_start = budget.protected_start(turn_count);
        match self.scope {
            ImageScope::All | ImageScope::RedundantOnly => protected_start,
            ImageScope::OldOnly => {
                let extended = budget.preserve_recent_turns.saturating_mul(2);
                turn_count.saturating_sub(extended).min(protected_start)
            }
        }
    }
}

impl CompactionStage for RemoveImages {
    fn name(&self) -> &'static str {
        "remove_images"
    }

    fn apply(
        &self,
        conversation: &Conversation,
        budget: &CompactionBudget,
        _estimator: &CostEstimator<'_>,
    ) -> Result<Conversation, StageError> {
        let end = self.redaction_end(conversation.len(), budget);

        // For RedundantOnly, the newest image-bearing turn in range survives
        // if it is recent enough to still describe the current screen.
        let spared_turn = if self.scope == ImageScope::RedundantOnly {
            let recent_start = conversation
                .len()
                .saturating_sub(budget.preserve_recent_turns.saturating_mul(2));
            conversation.turns[..end]
                .iter()
                .rposition(turn_has_image)
                .filter(|&index| index >= recent_start)
        } else {
            None
        };

        let mut redacted = 0usize;
        let turns = conversation
            .iter()
            .enumerate()
            .map(|(index, turn)| {
                if index >= end || spared_turn == Some(index) {
                    return turn.clone();
                }
                redact_turn(turn, &mut redacted)
            })
            .collect();

        if redacted > 0 {
            tracing::debug!(scope = ?self.scope, redacted, "Redacted image payloads");
        }

        Ok(Conversation::from_turns(turns))
    }
}

fn turn_has_image(turn: &Turn) -> bool {
    turn.content.iter().any(|unit| {
        unit.as_tool_call()
            .map(|call| call.has_image_result())
            .unwrap_or(false)
    })
}

/// Copy a turn, redacting image results and pending image requests.
fn redact_turn(turn: &Turn, redacted: &mut usize) -> Turn {
    let content = turn
        .content
        .iter()
        .map(|unit| match unit {
            ContentUnit::ToolCall(call) if call.has_image_result() => {
                *redacted += 1;
                let mut call = call.clone();
                call.result = Some(ToolResult::plain_text(IMAGE_REDACTED_MARKER));
                ContentUnit::ToolCall(call)
            }
            ContentUnit::ToolCall(call)
                if call.state == ToolCallState::Requested && call.is_screen_observation() =>
            {
                *redacted += 1;
                let mut call = call.clone();
                call.state = ToolCallState::Completed;
                call.result = Some(ToolResult::plain_text(IMAGE_REQUEST_REDACTED_MARKER));
                ContentUnit::ToolCall(call)
            }
            other => other.clone(),
        })
        .collect();

    Turn::with_id(turn.id.clone(), turn.role, content, turn.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderError, TokenEncoder};
    use chat_core::{Role, ToolCallUnit};
    use serde_json::json;

    struct FixedEncoder;

    impl TokenEncoder for FixedEncoder {
        fn encode_len(&self, text: &str) -> Result<u32, EncoderError> {
            Ok((text.chars().count() as u32).div_ceil(4))
        }
    }

    fn estimator() -> CostEstimator<'static> {
        CostEstimator::with_encoder(Box::new(FixedEncoder))
    }

    fn screenshot_turn() -> Turn {
        Turn::assistant(vec![ContentUnit::ToolCall(ToolCallUnit::completed(
            "desktop",
            json!({"action": "screenshot"}),
            ToolResult::image("QUFBQQ=="),
        ))])
    }

    #[test]
    fn redacts_images_outside_protected_window() {
        let conversation = Conversation::from_turns(vec![
            screenshot_turn(),
            Turn::text(Role::User, "hello"),
            screenshot_turn(),
        ]);
        let budget = CompactionBudget::new(1_000, 800, 1);

        let result = RemoveImages::all()
            .apply(&conversation, &budget, &estimator())
            .unwrap();

        let old_call = result.turns[0].content[0].as_tool_call().unwrap();
        assert_eq!(
            old_call.result,
            Some(ToolResult::plain_text(IMAGE_REDACTED_MARKER))
        );
        // Protected turn is untouched
        assert_eq!(result.turns[2], conversation.turns[2]);
    }

    #[test]
    fn pending_request_replaced_not_deleted() {
        let pending = Turn::assistant(vec![ContentUnit::ToolCall(ToolCallUnit::requested(
            "desktop",
            json!({"action": "screenshot"}),
        ))]);
        let conversation =
            Conversation::from_turns(vec![pending, Turn::text(Role::User, "recent")]);
        let budget = CompactionBudget::new(1_000, 800, 1);

        let result = RemoveImages::all()
            .apply(&conversation, &budget, &estimator())
            .unwrap();

        // Unit count unchanged: call/result pairing preserved
        assert_eq!(result.turns[0].content.len(), 1);
        let call = result.turns[0].content[0].as_tool_call().unwrap();
        assert_eq!(call.state, ToolCallState::Completed);
        assert_eq!(
            call.result,
            Some(ToolResult::plain_text(IMAGE_REQUEST_REDACTED_MARKER))
        );
    }

    #[test]
    fn old_only_spares_recent_images() {
        let turns: Vec<Turn> = (0..6).map(|_| screenshot_turn()).collect();
        let conversation = Conversation::from_turns(turns);
        let budget = CompactionBudget::new(1_000, 800, 2);

        let result = RemoveImages::old_only()
            .apply(&conversation, &budget, &estimator())
            .unwrap();

        // 6 turns, preserve 2, old-only bound = 6 - 4 = 2
        for index in 0..2 {
            let call = result.turns[index].content[0].as_tool_call().unwrap();
            assert!(!call.has_image_result(), "turn {index} should be redacted");
        }
        for index in 2..6 {
            let call = result.turns[index].content[0].as_tool_call().unwrap();
            assert!(call.has_image_result(), "turn {index} should be spared");
        }
    }

    #[test]
    fn redundant_only_keeps_newest_image() {
        let conversation = Conversation::from_turns(vec![
            screenshot_turn(),
            screenshot_turn(),
            screenshot_turn(),
            Turn::text(Role::User, "recent"),
        ]);
        let budget = CompactionBudget::new(1_000, 800, 1);

        let result = RemoveImages::redundant_only()
            .apply(&conversation, &budget, &estimator())
            .unwrap();

        let images: Vec<bool> = result.turns[..3]
            .iter()
            .map(|t| t.content[0].as_tool_call().unwrap().has_image_result())
            .collect();
        assert_eq!(images, vec![false, false, true]);
    }

    #[test]
    fn idempotent_on_already_redacted_conversation() {
        let conversation = Conversation::from_turns(vec![
            screenshot_turn(),
            Turn::text(Role::User, "recent"),
        ]);
        let budget = CompactionBudget::new(1_000, 800, 1);
        let stage = RemoveImages::all();

        let once = stage.apply(&conversation, &budget, &estimator()).unwrap();
        let twice = stage.apply(&once, &budget, &estimator()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn fully_protected_conversation_unchanged() {
        let conversation = Conversation::from_turns(vec![screenshot_turn()]);
        let budget = CompactionBudget::new(1_000, 800, 5);

        let result = RemoveImages::all()
            .apply(&conversation, &budget, &estimator())
            .unwrap();

        assert_eq!(result, conversation);
    }
}
