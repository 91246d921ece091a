pub mod conversation;
pub mod message;

pub use conversation::Conversation;
pub use message::{
    ContentUnit, Role, ToolCallState, ToolCallUnit, ToolResult, Turn,
};
