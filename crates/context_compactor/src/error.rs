//! Internal error taxonomy.
//!
//! Every error here is recovered inside the engine: the public `compact`
//! contract is total and degrades to the fallback compactor instead of
//! propagating.

use thiserror::Error;

use crate::encoder::EncoderError;

/// Error raised by a single compaction stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// A stage failed unexpectedly
    #[error("Stage '{stage}' failed: {reason}")]
    Failed { stage: String, reason: String },
}

/// Error raised anywhere inside a `compact` call.
#[derive(Debug, Error)]
pub enum CompactionError {
    /// The encoding resource could not be acquired
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    /// A pipeline stage failed
    #[error(transparent)]
    Stage(#[from] StageError),
}
