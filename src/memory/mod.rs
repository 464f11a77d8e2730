//! 记忆层：短期对话（简单 Agent）与 ReAct 轨迹

pub mod conversation;
pub mod trace;

pub use conversation::{ConversationMemory, Message, Role};
pub use trace::Trace;
