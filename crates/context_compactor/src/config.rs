//! Compaction budget configuration.
//!
//! Defines the token ceilings and the protected window driving compaction
//! decisions.

use serde::{Deserialize, Serialize};

/// Default values for compaction budgets.
pub mod defaults {
    /// Hard payload ceiling in tokens.
    pub const MAX_TOKENS: u32 = 100_000;

    /// Target to compact down to, below the ceiling to leave headroom.
    pub const TARGET_TOKENS: u32 = 80_000;

    /// Most recent turns that compaction must never alter.
    pub const PRESERVE_RECENT_TURNS: usize = 5;
}

/// Token budget configuration for a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionBudget {
    /// Hard payload ceiling for the outgoing request
    pub max_tokens: u32,
    /// Token count compaction aims for (`target_tokens <= max_tokens`)
    pub target_tokens: u32,
    /// Number of most recent turns that are never touched
    pub preserve_recent_turns: usize,
}

impl CompactionBudget {
    /// Create a new budget. `target_tokens` is clamped to `max_tokens`.
    pub fn new(max_tokens: u32, target_tokens: u32, preserve_recent_turns: usize) -> Self {
        Self {
            max_tokens,
            target_tokens: target_tokens.min(max_tokens),
            preserve_recent_turns,
        }
    }

    /// Tight budget for small context windows.
    pub fn aggressive() -> Self {
        Self::new(50_000, 40_000, 3)
    }

    /// Relaxed budget for large context windows.
    pub fn relaxed() -> Self {
        Self::new(150_000, 120_000, 10)
    }

    /// Index of the first protected turn for a conversation of `turn_count`
    /// turns. Everything at or past this index must not be modified.
    ///
    /// The window is clamped to the conversation length, so short
    /// conversations are fully protected.
    pub fn protected_start(&self, turn_count: usize) -> usize {
        turn_count - self.preserve_recent_turns.min(turn_count)
    }
}

impl Default for CompactionBudget {
    fn default() -> Self {
        Self::new(
            defaults::MAX_TOKENS,
            defaults::TARGET_TOKENS,
            defaults::PRESERVE_RECENT_TURNS,
        )
    }
}
