//! Turn - one role-attributed message in a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::ContentUnit;

/// Role of a turn in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-attributed message made up of ordered content units.
///
/// Turns are owned by their [`Conversation`](crate::Conversation) and are
/// replaced wholesale when transformed, never mutated through shared
/// references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: Vec<ContentUnit>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a turn with an explicit id and timestamp.
    pub fn with_id(
        id: impl Into<String>,
        role: Role,
        content: Vec<ContentUnit>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content,
            created_at,
        }
    }

    /// Create a new turn with a generated id.
    pub fn new(role: Role, content: Vec<ContentUnit>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: Vec<ContentUnit>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: Vec<ContentUnit>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: Vec<ContentUnit>) -> Self {
        Self::new(Role::System, content)
    }

    /// Convenience constructor for a single-text turn.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![ContentUnit::text(text)])
    }

    /// Get all text content concatenated.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|u| u.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether this turn carries only tool telemetry: every unit is a
    /// structural marker or a screen-observation tool call, with at least
    /// one tool call present.
    pub fn is_observation_only(&self) -> bool {
        let mut saw_tool_call = false;
        for unit in &self.content {
            match unit {
                ContentUnit::Marker { .. } => {}
                ContentUnit::ToolCall(call) if call.is_screen_observation() => {
                    saw_tool_call = true;
                }
                _ => return false,
            }
        }
        saw_tool_call
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ToolCallUnit, ToolResult};
    use serde_json::json;

    #[test]
    fn text_turn_concatenates_units() {
        let turn = Turn::user(vec![ContentUnit::text("Hello "), ContentUnit::text("world")]);
        assert_eq!(turn.as_text(), "Hello world");
    }

    #[test]
    fn screenshot_only_turn_is_observation() {
        let turn = Turn::assistant(vec![ContentUnit::ToolCall(ToolCallUnit::completed(
            "desktop",
            json!({"action": "screenshot"}),
            ToolResult::image("aGVsbG8="),
        ))]);
        assert!(turn.is_observation_only());
    }

    #[test]
    fn turn_with_dialogue_is_not_observation() {
        let turn = Turn::assistant(vec![
            ContentUnit::text("Looking at the page now"),
            ContentUnit::ToolCall(ToolCallUnit::requested(
                "desktop",
                json!({"action": "screenshot"}),
            )),
        ]);
        assert!(!turn.is_observation_only());
    }

    #[test]
    fn marker_only_turn_is_not_observation() {
        let turn = Turn::assistant(vec![ContentUnit::step_boundary()]);
        assert!(!turn.is_observation_only());
    }
}
