//! Token-budget compaction for LLM conversations.
//!
//! This crate keeps a growing multi-turn, multi-modal conversation under a
//! hard payload ceiling before it is handed to a model provider. It combines
//! cost accounting over heterogeneous content (text, tool calls, tool
//! results that may embed images), a policy selector that picks a lossy
//! compaction strategy from the measured cost composition, and a
//! short-circuiting stage pipeline with strict invariants: the most recent
//! turns are never touched, the engine never panics, and every call
//! terminates with a valid conversation.
//!
//! # Key Components
//!
//! - [`cost`]: cost estimation via exact encoding with heuristic degradation
//! - [`strategy`]: pure mapping from cost composition to a [`Strategy`]
//! - [`stages`]: independent, idempotent conversation transformations
//! - [`pipeline`]: ordered stage execution with per-stage re-measurement
//! - [`fallback`]: encoder-free safety net used on unexpected failures
//! - [`compactor`]: the [`Compactor`] facade, the single entry point

pub mod compactor;
pub mod config;
pub mod cost;
pub mod encoder;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod stages;
pub mod strategy;

pub use compactor::{CompactionReport, CompactionStats, Compactor};
pub use config::CompactionBudget;
pub use cost::{CostBreakdown, CostEstimator};
pub use encoder::{EncoderError, EncoderProvider, TiktokenProvider, TokenEncoder};
pub use error::{CompactionError, StageError};
pub use fallback::fallback_compact;
pub use pipeline::{run_pipeline, stages_for};
pub use stages::CompactionStage;
pub use strategy::{select, Strategy, StrategyChoice};
