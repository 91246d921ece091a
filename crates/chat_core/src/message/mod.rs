//! Message module - Turn and content types
//!
//! Shared conversation types used across the system.

mod content;
mod turn;

pub use content::{ContentUnit, ToolCallState, ToolCallUnit, ToolResult};
pub use turn::{Role, Turn};
