//! ContentUnit - Turn content types
//!
//! Defines the different types of content that can appear in a turn.
//! The content model is a closed tagged union so that every consumer
//! handles every shape exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool actions that only observe the screen and carry no dialogue value.
const SCREEN_OBSERVATION_ACTIONS: &[&str] = &["screenshot", "read_screen"];

/// One atomic piece of a turn's payload (text, a tool call, or a marker).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentUnit {
    /// Plain text content
    Text { text: String },

    /// A tool invocation issued by the model, possibly with its result
    ToolCall(ToolCallUnit),

    /// Structural marker with negligible cost (e.g. a step boundary)
    Marker { label: String },
}

impl ContentUnit {
    /// Create a text content unit
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a step-boundary marker
    pub fn step_boundary() -> Self {
        Self::Marker {
            label: "step_boundary".to_string(),
        }
    }

    /// Get text content if this is a text unit
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Get the tool call if this is a tool-call unit
    pub fn as_tool_call(&self) -> Option<&ToolCallUnit> {
        match self {
            Self::ToolCall(call) => Some(call),
            _ => None,
        }
    }
}

/// Lifecycle state of a tool call.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallState {
    /// Issued by the model, result not yet available
    Requested,
    /// Result has been recorded
    Completed,
}

/// A tool invocation with its (optional) result.
///
/// `result` is present only when `state` is [`ToolCallState::Completed`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCallUnit {
    /// Name of the invoked tool
    pub tool_name: String,
    /// Opaque, serializable argument map
    pub args: Value,
    /// Current lifecycle state
    pub state: ToolCallState,
    /// Result, present once the call completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

impl ToolCallUnit {
    /// Create a tool call that has been issued but not yet answered
    pub fn requested(tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            state: ToolCallState::Requested,
            result: None,
        }
    }

    /// Create a completed tool call with its result
    pub fn completed(tool_name: impl Into<String>, args: Value, result: ToolResult) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            state: ToolCallState::Completed,
            result: Some(result),
        }
    }

    /// Whether this call is a pure screen observation (e.g. a screenshot),
    /// as marked by its `action` argument.
    pub fn is_screen_observation(&self) -> bool {
        self.args
            .get("action")
            .and_then(Value::as_str)
            .map(|action| SCREEN_OBSERVATION_ACTIONS.contains(&action))
            .unwrap_or(false)
    }

    /// Whether the recorded result is an image payload
    pub fn has_image_result(&self) -> bool {
        matches!(self.result, Some(ToolResult::Image { .. }))
    }
}

/// The value returned to the model by a completed tool call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    /// Unstructured text output
    PlainText { text: String },

    /// Structured output serialized to text (e.g. JSON)
    StructuredText { data: String },

    /// Image payload as a base64 string
    Image { data: String },

    /// Anything else, kept as opaque JSON
    Other { value: Value },
}

impl ToolResult {
    /// Create a plain-text result
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    /// Create a structured-text result
    pub fn structured(data: impl Into<String>) -> Self {
        Self::StructuredText { data: data.into() }
    }

    /// Create an image result from base64 data
    pub fn image(data: impl Into<String>) -> Self {
        Self::Image { data: data.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_unit_exposes_text() {
        let unit = ContentUnit::text("hello");
        assert_eq!(unit.as_text(), Some("hello"));
        assert!(unit.as_tool_call().is_none());
    }

    #[test]
    fn screenshot_call_is_screen_observation() {
        let call = ToolCallUnit::requested("desktop", json!({"action": "screenshot"}));
        assert!(call.is_screen_observation());

        let call = ToolCallUnit::requested("desktop", json!({"action": "click", "x": 10}));
        assert!(!call.is_screen_observation());
    }

    #[test]
    fn image_result_detected() {
        let call = ToolCallUnit::completed(
            "desktop",
            json!({"action": "screenshot"}),
            ToolResult::image("aGVsbG8="),
        );
        assert!(call.has_image_result());
        assert_eq!(call.state, ToolCallState::Completed);
    }
}
