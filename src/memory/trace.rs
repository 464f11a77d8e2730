//! ReAct 轨迹记忆
//!
//! 单次运行内只追加的消息序列：每次思考输出、工具选择、工具结果与最终回答都记为一条伪消息。
//! 轨迹不会作为多轮对话回放给 LLM，而是序列化为 `role: content` 行内联进思考 prompt，避免上下文无限增长。

use serde::Serialize;

use crate::memory::{Message, Role};

#[derive(Clone, Debug, Default, Serialize)]
pub struct Trace {
    messages: Vec<Message>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 按顺序渲染为 `role: content`，换行分隔；空轨迹渲染为空串
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
