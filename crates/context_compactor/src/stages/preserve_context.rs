//! Context preservation placeholder stage.
//!
//! Runs after aggressive truncation as a hook for re-injecting key context
//! (e.g. a digest of removed turns). Currently a no-op.

use chat_core::Conversation;

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::CompactionStage;

#[derive(Debug, Clone, Copy, Default)]
pub struct PreserveContext;

impl PreserveContext {
    pub fn new() -> Self {
        Self
    }
}

impl CompactionStage for PreserveContext {
    fn name(&self) -> &'static str {
        "preserve_context"
    }

    fn apply(
        &self,
        conversation: &Conversation,
        _budget: &CompactionBudget,
        _estimator: &CostEstimator<'_>,
    ) -> Result<Conversation, StageError> {
        Ok(conversation.clone())
    }
}
