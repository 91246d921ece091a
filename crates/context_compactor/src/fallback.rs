//! Fallback compactor - the dependency-free safety net.
//!
//! Used when the estimator or pipeline fails unexpectedly. Makes no encoder
//! calls, runs in a single pass over the content units, always terminates,
//! never fails. Image payloads outside the protected window are replaced
//! with fixed redaction markers.

use chat_core::{ContentUnit, Conversation, ToolCallState, ToolResult, Turn};

use crate::stages::{IMAGE_REDACTED_MARKER, IMAGE_REQUEST_REDACTED_MARKER};

/// Redact every image outside the last `preserve_recent_turns` turns.
pub fn fallback_compact(conversation: &Conversation, preserve_recent_turns: usize) -> Conversation {
    let protected_start =
        conversation.len() - preserve_recent_turns.min(conversation.len());

    let turns = conversation
        .iter()
        .enumerate()
        .map(|(index, turn)| {
            if index >= protected_start {
                return turn.clone();
            }
            redact_turn(turn)
        })
        .collect();

    Conversation::from_turns(turns)
}

fn redact_turn(turn: &Turn) -> Turn {
    let content = turn
        .content
        .iter()
        .map(|unit| match unit {
            ContentUnit::ToolCall(call) if call.has_image_result() => {
                let mut call = call.clone();
                call.result = Some(ToolResult::plain_text(IMAGE_REDACTED_MARKER));
                ContentUnit::ToolCall(call)
            }
            ContentUnit::ToolCall(call)
                if call.state == ToolCallState::Requested && call.is_screen_observation() =>
            {
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
    use chat_core::{Role, ToolCallUnit};
    use serde_json::json;

    fn screenshot_turn() -> Turn {
        Turn::assistant(vec![ContentUnit::ToolCall(ToolCallUnit::completed(
            "desktop",
            json!({"action": "screenshot"}),
            ToolResult::image("QUFBQQ=="),
        ))])
    }

    #[test]
    fn redacts_all_unprotected_images() {
        let conversation = Conversation::from_turns(vec![
            screenshot_turn(),
            screenshot_turn(),
            Turn::text(Role::User, "recent"),
        ]);

        let result = fallback_compact(&conversation, 1);

        for turn in &result.turns[..2] {
            let call = turn.content[0].as_tool_call().unwrap();
            assert!(!call.has_image_result());
        }
        assert_eq!(result.turns[2], conversation.turns[2]);
    }

    #[test]
    fn preserves_order_and_turn_count() {
        let conversation = Conversation::from_turns(vec![
            Turn::text(Role::User, "a"),
            screenshot_turn(),
            Turn::text(Role::User, "b"),
        ]);

        let result = fallback_compact(&conversation, 0);

        assert_eq!(result.len(), 3);
        assert_eq!(result.turns[0].as_text(), "a");
        assert_eq!(result.turns[2].as_text(), "b");
    }

    #[test]
    fn window_larger_than_conversation_is_noop() {
        let conversation = Conversation::from_turns(vec![screenshot_turn()]);

        let result = fallback_compact(&conversation, 10);

        assert_eq!(result, conversation);
    }
}
