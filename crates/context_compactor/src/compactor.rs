//! Compaction facade - the single entry point.
//!
//! Wires the estimator, selector, and pipeline together and guarantees a
//! result is always returned: any failure between estimation and execution
//! degrades to the fallback compactor. The encoding resource is acquired
//! when the call starts and released when it returns, on every exit path.

use std::sync::Arc;

use chat_core::Conversation;
use serde::{Deserialize, Serialize};

use crate::config::CompactionBudget;
use crate::cost::{CostBreakdown, CostEstimator};
use crate::encoder::{EncoderProvider, TiktokenProvider};
use crate::error::CompactionError;
use crate::fallback::fallback_compact;
use crate::pipeline::run_pipeline;
use crate::strategy::{select, Strategy};

/// Outcome of one compaction call, for logging and telemetry.
#[derive(Debug, Clone)]
pub struct CompactionReport {
    /// The compacted conversation
    pub conversation: Conversation,
    /// Strategy that was applied
    pub strategy: Strategy,
    /// Human-readable justification for the strategy
    pub reason: String,
    /// Cost before compaction
    pub before: CostBreakdown,
    /// Cost after compaction
    pub after: CostBreakdown,
    /// Turns removed by compaction
    pub turns_removed: usize,
    /// Whether the dependency-free fallback path fired
    pub used_fallback: bool,
}

/// Summary of a report without the conversation payload, for structured
/// logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionStats {
    pub strategy: Strategy,
    pub before_tokens: u32,
    pub after_tokens: u32,
    pub turns_removed: usize,
    pub used_fallback: bool,
}

impl CompactionReport {
    pub fn stats(&self) -> CompactionStats {
        CompactionStats {
            strategy: self.strategy,
            before_tokens: self.before.total,
            after_tokens: self.after.total,
            turns_removed: self.turns_removed,
            used_fallback: self.used_fallback,
        }
    }
}

/// The compaction engine facade.
///
/// Stateless between calls apart from the shared [`EncoderProvider`], which
/// is only read. Concurrent calls on different conversations are
/// independent; calls on the same conversation must be serialized by the
/// owning chat session.
pub struct Compactor {
    provider: Arc<dyn EncoderProvider>,
}

impl Compactor {
    /// Create a compactor with a custom encoder provider.
    pub fn new(provider: Arc<dyn EncoderProvider>) -> Self {
        Self { provider }
    }

    /// Compact `conversation` to fit `budget`.
    ///
    /// Total: never panics, never fails, always returns a valid
    /// conversation. Returns the input unchanged when it is already within
    /// budget.
    pub fn compact(&self, conversation: &Conversation, budget: &CompactionBudget) -> Conversation {
        self.compact_with_report(conversation, budget).conversation
    }

    /// Compact and return the full [`CompactionReport`].
    pub fn compact_with_report(
        &self,
        conversation: &Conversation,
        budget: &CompactionBudget,
    ) -> CompactionReport {
        // Acquire the encoding resource up front; the estimator owns it and
        // drops it when this call returns, whichever path is taken.
        let outcome = self
            .provider
            .acquire()
            .map_err(CompactionError::from)
            .and_then(|encoder| {
                let estimator = CostEstimator::with_encoder(encoder);
                self.try_compact(&estimator, conversation, budget)
            });

        match outcome {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Compaction failed, using fallback compactor: {e}");
                self.fallback_report(conversation, budget)
            }
        }
    }

    /// Estimate the cost of `conversation` against `target_tokens`.
    ///
    /// Side-effect free and safe to call frequently (e.g. on every render).
    /// Acquires a private encoder lazily and releases it on return; with no
    /// encoder available the whole-conversation heuristic is used.
    pub fn estimate(&self, conversation: &Conversation, target_tokens: u32) -> CostBreakdown {
        let estimator = CostEstimator::new(self.provider.as_ref());
        estimator.estimate(conversation, target_tokens)
    }

    fn try_compact(
        &self,
        estimator: &CostEstimator<'_>,
        conversation: &Conversation,
        budget: &CompactionBudget,
    ) -> Result<CompactionReport, CompactionError> {
        let before = estimator.estimate(conversation, budget.target_tokens);

        if !before.needs_optimization {
            return Ok(CompactionReport {
                conversation: conversation.clone(),
                strategy: Strategy::None,
                reason: format!(
                    "total {} within target {}",
                    before.total, budget.target_tokens
                ),
                after: before.clone(),
                before,
                turns_removed: 0,
                used_fallback: false,
            });
        }

        let choice = select(&before, budget);
        tracing::info!(
            strategy = ?choice.strategy,
            total = before.total,
            target = budget.target_tokens,
            reason = %choice.reason,
            "Compacting conversation"
        );

        let result = run_pipeline(conversation, choice.strategy, budget, estimator)?;
        let after = estimator.estimate(&result, budget.target_tokens);

        if after.total > budget.max_tokens {
            // Non-fatal: best-effort result with a caller-visible warning.
            tracing::warn!(
                total = after.total,
                max = budget.max_tokens,
                "Pipeline exhausted with residual overshoot"
            );
        }

        Ok(CompactionReport {
            conversation: result.clone(),
            strategy: choice.strategy,
            reason: choice.reason,
            before,
            after,
            turns_removed: conversation.len().saturating_sub(result.len()),
            used_fallback: false,
        })
    }

    fn fallback_report(
        &self,
        conversation: &Conversation,
        budget: &CompactionBudget,
    ) -> CompactionReport {
        let result = fallback_compact(conversation, budget.preserve_recent_turns);

        // Encoder-free approximations; good enough for observability.
        let before = crate::cost::estimate_heuristic(conversation, budget.target_tokens);
        let after = crate::cost::estimate_heuristic(&result, budget.target_tokens);

        CompactionReport {
            conversation: result,
            strategy: Strategy::None,
            reason: "fallback: image redaction only".to_string(),
            before,
            after,
            turns_removed: 0,
            used_fallback: true,
        }
    }
}

impl Default for Compactor {
    fn default() -> Self {
        Self::new(Arc::new(TiktokenProvider::new()))
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

    struct FixedProvider;

    impl EncoderProvider for FixedProvider {
        fn acquire(&self) -> Result<Box<dyn TokenEncoder>, EncoderError> {
            Ok(Box::new(FixedEncoder))
        }
    }

    struct UnavailableProvider;

    impl EncoderProvider for UnavailableProvider {
        fn acquire(&self) -> Result<Box<dyn TokenEncoder>, EncoderError> {
            Err(EncoderError::Unavailable("injected".into()))
        }
    }

    #[test]
    fn within_budget_returns_input_unchanged() {
        let compactor = Compactor::new(Arc::new(FixedProvider));
        let conversation = Conversation::from_turns(vec![
            Turn::text(Role::User, "hello"),
            Turn::text(Role::Assistant, "hi"),
        ]);
        let budget = CompactionBudget::new(100_000, 80_000, 3);

        let report = compactor.compact_with_report(&conversation, &budget);

        assert_eq!(report.strategy, Strategy::None);
        assert_eq!(report.conversation, conversation);
        assert!(!report.used_fallback);
    }

    #[test]
    fn broken_provider_routes_to_fallback() {
        let compactor = Compactor::new(Arc::new(UnavailableProvider));
        let conversation = Conversation::from_turns(vec![Turn::text(Role::User, "hello")]);
        let budget = CompactionBudget::default();

        let report = compactor.compact_with_report(&conversation, &budget);

        assert!(report.used_fallback);
        assert_eq!(report.conversation.len(), 1);
    }

    #[test]
    fn estimate_is_total_with_broken_provider() {
        let compactor = Compactor::new(Arc::new(UnavailableProvider));
        let conversation = Conversation::from_turns(vec![Turn::text(Role::User, "abcdefgh")]);

        let breakdown = compactor.estimate(&conversation, 1_000);

        assert_eq!(breakdown.total, 2);
        assert!(!breakdown.needs_optimization);
    }

    #[test]
    fn report_stats_mirror_report() {
        let compactor = Compactor::new(Arc::new(FixedProvider));
        let conversation = Conversation::from_turns(vec![Turn::text(Role::User, "hello")]);
        let budget = CompactionBudget::default();

        let report = compactor.compact_with_report(&conversation, &budget);
        let stats = report.stats();

        assert_eq!(stats.strategy, report.strategy);
        assert_eq!(stats.before_tokens, report.before.total);
        assert_eq!(stats.after_tokens, report.after.total);
    }
}
