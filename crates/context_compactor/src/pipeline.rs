//! Pipeline executor - runs the stage list for a strategy.
//!
//! The strategy-to-stages mapping is a data table so new strategies and
//! stages stay additive and independently testable. After every stage the
//! cost is re-measured; execution stops as soon as the target is met.
//! Exhausting the list while still over budget is a non-fatal condition:
//! the best-effort result is returned and the caller logs the overshoot.

use chat_core::Conversation;

use crate::config::CompactionBudget;
use crate::cost::CostEstimator;
use crate::error::StageError;
use crate::stages::{
    CompactionStage, CompressToolResults, CompressVerboseText, PreserveContext, RemoveImages,
    SummarizeOldTurns, TruncateToTarget, ValidateTranscript,
};
use crate::strategy::Strategy;

/// Ordered stage list for a strategy. Ordering matters: later stages see
/// the output of earlier ones.
pub fn stages_for(strategy: Strategy) -> Vec<Box<dyn CompactionStage>> {
    match strategy {
        Strategy::None => vec![],
        Strategy::AggressiveImageRemoval => vec![
            Box::new(RemoveImages::all()),
            Box::new(CompressToolResults::default()),
            Box::new(TruncateToTarget::new()),
        ],
        Strategy::HybridOptimization => vec![
            Box::new(RemoveImages::old_only()),
            Box::new(SummarizeOldTurns::new()),
            Box::new(CompressToolResults::default()),
            Box::new(ValidateTranscript::new()),
        ],
        Strategy::AggressiveTruncation => vec![
            Box::new(RemoveImages::old_only()),
            Box::new(TruncateToTarget::new()),
            Box::new(PreserveContext::new()),
        ],
        Strategy::GentleOptimization => vec![
            Box::new(RemoveImages::redundant_only()),
            Box::new(CompressVerboseText::default()),
            Box::new(CompressToolResults::default()),
        ],
        Strategy::MinimalCleanup => vec![
            Box::new(RemoveImages::old_only()),
            Box::new(CompressToolResults::default()),
        ],
    }
}

/// Run the stage list for `strategy`, short-circuiting once the target is
/// met. Returns the best-effort conversation even if the list is exhausted
/// while still over budget.
pub fn run_pipeline(
    conversation: &Conversation,
    strategy: Strategy,
    budget: &CompactionBudget,
    estimator: &CostEstimator<'_>,
) -> Result<Conversation, StageError> {
    run_stages(&stages_for(strategy), conversation, budget, estimator)
}

/// Run an explicit stage list. Split out from [`run_pipeline`] so custom
/// stage sequences stay testable in isolation.
pub fn run_stages(
    stages: &[Box<dyn CompactionStage>],
    conversation: &Conversation,
    budget: &CompactionBudget,
    estimator: &CostEstimator<'_>,
) -> Result<Conversation, StageError> {
    let mut current = conversation.clone();

    for stage in stages {
        let next = stage.apply(&current, budget, estimator)?;
        let after = estimator.estimate(&next, budget.target_tokens);

        tracing::debug!(
            stage = stage.name(),
            total = after.total,
            target = budget.target_tokens,
            "Stage applied"
        );

        current = next;

        if !after.needs_optimization {
            tracing::debug!(stage = stage.name(), "Target met, short-circuiting");
            break;
        }
    }

    Ok(current)
}
