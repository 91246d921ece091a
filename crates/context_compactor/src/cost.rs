//! Cost estimation over heterogeneous conversation content.
//!
//! Converts a conversation into a [`CostBreakdown`] using the exact encoder
//! when available. Estimation is total: every internal failure degrades to a
//! character heuristic, and a missing encoder degrades to a
//! whole-conversation heuristic.

use chat_core::{ContentUnit, Conversation, ToolCallState, ToolCallUnit, ToolResult};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::encoder::{heuristic_tokens, EncoderProvider, TokenEncoder};

/// Structural overhead per tool call (call id and state framing).
const TOOL_CALL_OVERHEAD: u32 = 10;
/// Substitute cost when tool args cannot be serialized.
const ARGS_FALLBACK_TOKENS: u32 = 20;
/// Envelope overhead for a text-bearing tool result.
const TEXT_RESULT_OVERHEAD: u32 = 4;
/// Approximate tokens per kilobyte of decoded image data.
///
/// Calibrated against one model family; an approximation, not a decode.
const IMAGE_TOKENS_PER_KB: u32 = 15;
/// Envelope overhead for an image result's metadata fields.
const IMAGE_ENVELOPE_OVERHEAD: u32 = 5;
/// Substitute cost when an opaque result cannot be serialized.
const OTHER_RESULT_FALLBACK: u32 = 50;
/// Cost of a tool call that has no result yet.
const PENDING_CALL_TOKENS: u32 = 2;
/// Cost of a structural marker.
const MARKER_TOKENS: u32 = 2;
/// Per-turn overhead for role and metadata framing.
const TURN_OVERHEAD: u32 = 5;
/// Characters per estimated image kilobyte in the whole-conversation
/// heuristic.
const HEURISTIC_IMAGE_CHARS_PER_KB: u64 = 60;

/// Token cost of a conversation, split by content category.
///
/// Recomputed on demand and never cached across mutations. `image_tokens`
/// is the image share already contained in `tool_tokens`; it is reported
/// separately for strategy selection and must not be added again when
/// computing totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Tokens from text units
    pub text_tokens: u32,
    /// Tokens from tool calls and all their results (images included)
    pub tool_tokens: u32,
    /// Image share of `tool_tokens`
    pub image_tokens: u32,
    /// `text_tokens + tool_tokens` plus structural framing
    pub total: u32,
    /// Whether `total` exceeds the target
    pub needs_optimization: bool,
}

impl CostBreakdown {
    /// Percentage of `target_tokens` currently used.
    pub fn usage_percentage(&self, target_tokens: u32) -> f64 {
        if target_tokens == 0 {
            return 0.0;
        }
        (self.total as f64 / target_tokens as f64) * 100.0
    }
}

/// Estimates conversation cost with a lazily acquired encoder.
///
/// The encoder is acquired on first use and released when the estimator is
/// dropped, so one estimator scopes the encoding resource to one `compact`
/// call. Acquisition failure is remembered and the estimator degrades to the
/// whole-conversation heuristic for its remaining lifetime.
pub struct CostEstimator<'a> {
    provider: Option<&'a dyn EncoderProvider>,
    encoder: OnceCell<Option<Box<dyn TokenEncoder>>>,
}

impl<'a> CostEstimator<'a> {
    /// Create an estimator that acquires its encoder from `provider` on
    /// first use.
    pub fn new(provider: &'a dyn EncoderProvider) -> Self {
        Self {
            provider: Some(provider),
            encoder: OnceCell::new(),
        }
    }

    /// Create an estimator around an already acquired encoder.
    pub fn with_encoder(encoder: Box<dyn TokenEncoder>) -> CostEstimator<'static> {
        let cell = OnceCell::new();
        let _ = cell.set(Some(encoder));
        CostEstimator {
            provider: None,
            encoder: cell,
        }
    }

    fn encoder(&self) -> Option<&dyn TokenEncoder> {
        self.encoder
            .get_or_init(|| {
                let provider = self.provider?;
                match provider.acquire() {
                    Ok(encoder) => Some(encoder),
                    Err(e) => {
                        tracing::warn!("Encoder acquisition failed, using heuristic: {e}");
                        None
                    }
                }
            })
            .as_deref()
    }

    /// Count tokens exactly, degrading to the character heuristic when the
    /// encoder fails on this input.
    fn count_text(&self, encoder: &dyn TokenEncoder, text: &str) -> u32 {
        encoder.encode_len(text).unwrap_or_else(|e| {
            tracing::debug!("Encode failed, substituting heuristic: {e}");
            heuristic_tokens(text)
        })
    }

    /// Estimate the cost of `conversation` against `target_tokens`.
    ///
    /// Never fails: with no encoder available the whole-conversation
    /// heuristic is used instead.
    pub fn estimate(&self, conversation: &Conversation, target_tokens: u32) -> CostBreakdown {
        let Some(encoder) = self.encoder() else {
            return estimate_heuristic(conversation, target_tokens);
        };

        let mut text_tokens: u32 = 0;
        let mut tool_tokens: u32 = 0;
        let mut image_tokens: u32 = 0;
        let mut structural_tokens: u32 = 0;

        for turn in conversation.iter() {
            structural_tokens = structural_tokens.saturating_add(TURN_OVERHEAD);

            for unit in &turn.content {
                match unit {
                    ContentUnit::Text { text } => {
                        text_tokens = text_tokens.saturating_add(self.count_text(encoder, text));
                    }
                    ContentUnit::ToolCall(call) => {
                        let (call_tokens, call_image_tokens) = self.count_tool_call(encoder, call);
                        tool_tokens = tool_tokens.saturating_add(call_tokens);
                        image_tokens = image_tokens.saturating_add(call_image_tokens);
                    }
                    ContentUnit::Marker { .. } => {
                        structural_tokens = structural_tokens.saturating_add(MARKER_TOKENS);
                    }
                }
            }
        }

        let total = text_tokens
            .saturating_add(tool_tokens)
            .saturating_add(structural_tokens);

        CostBreakdown {
            text_tokens,
            tool_tokens,
            image_tokens,
            total,
            needs_optimization: total > target_tokens,
        }
    }

    /// Count one tool call. Returns `(tool_tokens, image_share)` where the
    /// image share is already included in the first component.
    fn count_tool_call(&self, encoder: &dyn TokenEncoder, call: &ToolCallUnit) -> (u32, u32) {
        let name_tokens = self.count_text(encoder, &call.tool_name);
        let args_tokens = match serde_json::to_string(&call.args) {
            Ok(serialized) => self.count_text(encoder, &serialized),
            Err(e) => {
                tracing::debug!("Tool args not serializable, substituting constant: {e}");
                ARGS_FALLBACK_TOKENS
            }
        };

        let mut tokens = name_tokens
            .saturating_add(args_tokens)
            .saturating_add(TOOL_CALL_OVERHEAD);
        let mut image_share = 0;

        match (call.state, &call.result) {
            (ToolCallState::Completed, Some(result)) => match result {
                ToolResult::PlainText { text } => {
                    tokens = tokens
                        .saturating_add(self.count_text(encoder, text))
                        .saturating_add(TEXT_RESULT_OVERHEAD);
                }
                ToolResult::StructuredText { data } => {
                    tokens = tokens
                        .saturating_add(self.count_text(encoder, data))
                        .saturating_add(TEXT_RESULT_OVERHEAD);
                }
                ToolResult::Image { data } => {
                    let cost = image_cost(data).saturating_add(IMAGE_ENVELOPE_OVERHEAD);
                    tokens = tokens.saturating_add(cost);
                    image_share = cost;
                }
                ToolResult::Other { value } => {
                    let cost = match serde_json::to_string(value) {
                        Ok(serialized) => self.count_text(encoder, &serialized),
                        Err(_) => OTHER_RESULT_FALLBACK,
                    };
                    tokens = tokens.saturating_add(cost);
                }
            },
            // Completed without a recorded result is treated like pending
            _ => {
                tokens = tokens.saturating_add(PENDING_CALL_TOKENS);
            }
        }

        (tokens, image_share)
    }
}

/// Approximate image cost from the base64 payload length: derive the decoded
/// byte size, convert to kilobytes, and apply the tokens-per-KB constant.
fn image_cost(base64_data: &str) -> u32 {
    let kb = image_kilobytes(base64_data);
    kb.saturating_mul(IMAGE_TOKENS_PER_KB as u64)
        .min(u32::MAX as u64) as u32
}

/// Estimated decoded size in kilobytes, rounded up.
fn image_kilobytes(base64_data: &str) -> u64 {
    let bytes = (base64_data.len() as u64) * 3 / 4;
    bytes.div_ceil(1024)
}

/// Whole-conversation heuristic used when no encoder can be constructed.
///
/// Sums unit character lengths (image payloads weighted by estimated KB)
/// and divides by four. The 50/20/30 category split is a display
/// approximation only; it is not used for correctness-critical decisions.
pub fn estimate_heuristic(conversation: &Conversation, target_tokens: u32) -> CostBreakdown {
    let mut chars: u64 = 0;

    for turn in conversation.iter() {
        for unit in &turn.content {
            match unit {
                ContentUnit::Text { text } => {
                    chars += text.chars().count() as u64;
                }
                ContentUnit::ToolCall(call) => {
                    chars += call.tool_name.chars().count() as u64;
                    chars += call.args.to_string().chars().count() as u64;
                    match &call.result {
                        Some(ToolResult::Image { data }) => {
                            chars += image_kilobytes(data) * HEURISTIC_IMAGE_CHARS_PER_KB;
                        }
                        Some(ToolResult::PlainText { text }) => {
                            chars += text.chars().count() as u64;
                        }
                        Some(ToolResult::StructuredText { data }) => {
                            chars += data.chars().count() as u64;
                        }
                        Some(ToolResult::Other { value }) => {
                            chars += value.to_string().chars().count() as u64;
                        }
                        None => {}
                    }
                }
                ContentUnit::Marker { .. } => {
                    chars += MARKER_TOKENS as u64;
                }
            }
        }
    }

    let total = (chars / 4).min(u32::MAX as u64) as u32;

    CostBreakdown {
        text_tokens: (total as u64 * 50 / 100) as u32,
        tool_tokens: (total as u64 * 20 / 100) as u32,
        image_tokens: (total as u64 * 30 / 100) as u32,
        total,
        needs_optimization: total > target_tokens,
    }
}
