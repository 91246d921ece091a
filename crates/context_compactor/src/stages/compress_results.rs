//! Tool-result compression stage.

use chat_core::{ContentUnit, Conversation, ToolResult, Turn};

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::{truncate_with_marker, CompactionStage};

/// Default ceiling above which a text result is compressed.
const DEFAULT_MAX_CHARS: usize = 1000;
/// Default prefix length kept when compressing.
const DEFAULT_KEEP_CHARS: usize = 500;

/// Stage that truncates oversized text-bearing tool results to a prefix
/// with a truncation marker.
#[derive(Debug, Clone, Copy)]
pub struct CompressToolResults {
    max_chars: usize,
    keep_chars: usize,
}

impl CompressToolResults {
    pub fn new(max_chars: usize, keep_chars: usize) -> Self {
        Self {
            max_chars,
            keep_chars: keep_chars.min(max_chars),
        }
    }
}

impl Default for CompressToolResults {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS, DEFAULT_KEEP_CHARS)
    }
}

impl CompactionStage for CompressToolResults {
    fn name(&self) -> &'static str {
        "compress_tool_results"
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
                self.compress_turn(turn)
            })
            .collect();

        Ok(Conversation::from_turns(turns))
    }
}

impl CompressToolResults {
    fn compress_turn(&self, turn: &Turn) -> Turn {
        let content = turn
            .content
            .iter()
            .map(|unit| match unit {
                ContentUnit::ToolCall(call) => {
                    let compressed = match &call.result {
                        Some(ToolResult::PlainText { text })
                            if text.chars().count() > self.max_chars =>
                        {
                            Some(ToolResult::plain_text(truncate_with_marker(
                                text,
                                self.keep_chars,
                            )))
                        }
                        Some(ToolResult::StructuredText { data })
                            if data.chars().count() > self.max_chars =>
                        {
                            Some(ToolResult::structured(truncate_with_marker(
                                data,
                                self.keep_chars,
                            )))
                        }
                        _ => None,
                    };

                    match compressed {
                        Some(result) => {
                            let mut call = call.clone();
                            call.result = Some(result);
                            ContentUnit::ToolCall(call)
                        }
                        None => unit.clone(),
                    }
                }
                other => other.clone(),
            })
            .collect();

        Turn::with_id(turn.id.clone(), turn.role, content, turn.created_at)
    }
}
