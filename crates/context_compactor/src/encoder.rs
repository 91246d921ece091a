//! Encoding resource for exact token counting.
//!
//! The engine treats the tokenizer as a fallible, scoped resource: it is
//! acquired once per `compact` call, shared read-only during estimation, and
//! released when the call returns. Every failure degrades to the character
//! heuristic instead of surfacing.

use thiserror::Error;
use tiktoken_rs::CoreBPE;

/// Characters per token used by the degradation heuristic.
pub(crate) const HEURISTIC_CHARS_PER_TOKEN: u32 = 4;

/// Errors raised by the encoding resource.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The encoder could not be constructed at all
    #[error("Encoder unavailable: {0}")]
    Unavailable(String),

    /// A single encode call failed
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
}

/// Exact token counting over text.
///
/// Implementations must be safe for concurrent read-only use.
pub trait TokenEncoder: Send + Sync {
    /// Count the tokens in `text`.
    fn encode_len(&self, text: &str) -> Result<u32, EncoderError>;
}

/// Constructs the encoding resource for one `compact` call.
pub trait EncoderProvider: Send + Sync {
    /// Acquire a fresh encoder. Construction is assumed fallible.
    fn acquire(&self) -> Result<Box<dyn TokenEncoder>, EncoderError>;
}

/// Tiktoken-backed encoder using the cl100k base encoding.
pub struct TiktokenEncoder {
    bpe: CoreBPE,
}

impl TokenEncoder for TiktokenEncoder {
    fn encode_len(&self, text: &str) -> Result<u32, EncoderError> {
        let tokens = self.bpe.encode_with_special_tokens(text);
        Ok(tokens.len().min(u32::MAX as usize) as u32)
    }
}

/// Default [`EncoderProvider`] backed by tiktoken.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiktokenProvider;

impl TiktokenProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EncoderProvider for TiktokenProvider {
    fn acquire(&self) -> Result<Box<dyn TokenEncoder>, EncoderError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| EncoderError::Unavailable(e.to_string()))?;
        Ok(Box::new(TiktokenEncoder { bpe }))
    }
}

/// Character-count heuristic: `ceil(chars / 4)`.
pub(crate) fn heuristic_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u64;
    chars
        .div_ceil(HEURISTIC_CHARS_PER_TOKEN as u64)
        .min(u32::MAX as u64) as u32
}
