//! Stage library - composable, idempotent conversation transformations.
//!
//! Each stage targets one compaction concern and obeys the same contract:
//! pure with respect to its input (the conversation is copied, never
//! mutated in place), idempotent (re-applying to already-compacted output
//! is a no-op), and the last `preserve_recent_turns` turns are never
//! touched.

mod compress_results;
mod compress_text;
mod preserve_context;
mod remove_images;
mod summarize;
mod truncate;
mod validate;

pub use compress_results::CompressToolResults;
pub use compress_text::CompressVerboseText;
pub use preserve_context::PreserveContext;
pub use remove_images::{ImageScope, RemoveImages, IMAGE_REDACTED_MARKER, IMAGE_REQUEST_REDACTED_MARKER};
pub use summarize::{SummarizeOldTurns, SUMMARY_PREFIX};
pub use truncate::TruncateToTarget;
pub use validate::ValidateTranscript;

use chat_core::Conversation;

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;

/// One composable transformation applied during compaction.
pub trait CompactionStage: Send + Sync {
    /// Name of this stage, for logging.
    fn name(&self) -> &'static str;

    /// Apply the stage, producing a new conversation.
    ///
    /// The estimator is available for stages that re-measure as they go
    /// (e.g. iterative truncation); most stages ignore it.
    fn apply(
        &self,
        conversation: &Conversation,
        budget: &CompactionBudget,
        estimator: &CostEstimator<'_>,
    ) -> Result<Conversation, StageError>;
}

/// Truncate `text` to at most `keep_chars` characters on a char boundary
/// and append the truncation marker.
pub(crate) fn truncate_with_marker(text: &str, keep_chars: usize) -> String {
    let prefix: String = text.chars().take(keep_chars).collect();
    format!("{prefix}...[truncated]")
}
