//! Strategy selection - maps cost composition to a compaction policy.
//!
//! Image payloads dominate cost non-linearly relative to their
//! conversational value, so strategies front-load image removal when images
//! are the dominant contributor. When deep cuts are needed but images are
//! scarce, whole-turn truncation is preferred over fine-grained text
//! editing, which is reserved for modest overshoot.

use serde::{Deserialize, Serialize};

use crate::config::CompactionBudget;
use crate::cost::CostBreakdown;

/// A named compaction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Already within budget, nothing to do
    None,
    /// Images dominate and a deep cut is needed
    AggressiveImageRemoval,
    /// Images are significant alongside other cost
    HybridOptimization,
    /// Deep cut needed with few images: drop whole turns
    AggressiveTruncation,
    /// Modest overshoot: compress in place
    GentleOptimization,
    /// Marginal overshoot: light touch only
    MinimalCleanup,
}

/// A selected strategy with its human-readable justification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyChoice {
    pub strategy: Strategy,
    pub reason: String,
}

/// Select a strategy for the measured cost composition.
///
/// Pure and total: no side effects, always returns a value. The decision
/// table is evaluated top to bottom, first match wins.
pub fn select(breakdown: &CostBreakdown, budget: &CompactionBudget) -> StrategyChoice {
    let total = breakdown.total as f64;

    let reduction_ratio = if breakdown.total > budget.target_tokens {
        (total - budget.target_tokens as f64) / total
    } else {
        0.0
    };
    let image_ratio = if breakdown.total > 0 {
        breakdown.image_tokens as f64 / total
    } else {
        0.0
    };

    if reduction_ratio <= 0.0 {
        return StrategyChoice {
            strategy: Strategy::None,
            reason: format!(
                "total {} within target {}",
                breakdown.total, budget.target_tokens
            ),
        };
    }

    let (strategy, reason) = if image_ratio > 0.6 && reduction_ratio > 0.3 {
        (
            Strategy::AggressiveImageRemoval,
            format!(
                "images are {:.0}% of cost and {:.0}% reduction needed",
                image_ratio * 100.0,
                reduction_ratio * 100.0
            ),
        )
    } else if image_ratio > 0.3 && reduction_ratio > 0.2 {
        (
            Strategy::HybridOptimization,
            format!(
                "images are {:.0}% of cost with {:.0}% reduction needed",
                image_ratio * 100.0,
                reduction_ratio * 100.0
            ),
        )
    } else if reduction_ratio > 0.5 {
        (
            Strategy::AggressiveTruncation,
            format!(
                "{:.0}% reduction needed with few images",
                reduction_ratio * 100.0
            ),
        )
    } else if reduction_ratio > 0.1 {
        (
            Strategy::GentleOptimization,
            format!("modest overshoot: {:.0}% reduction needed", reduction_ratio * 100.0),
        )
    } else {
        (
            Strategy::MinimalCleanup,
            format!(
                "marginal overshoot: {:.0}% reduction needed",
                reduction_ratio * 100.0
            ),
        )
    };

    StrategyChoice { strategy, reason }
}
