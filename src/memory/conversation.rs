//! 短期记忆：对话历史
//!
//! 保留最近 N 轮对话（user/assistant 对），超出时自动剪枝；system 消息单独保存，始终排在最前，
//! 供简单 Agent 的 `respond_with_memory` 做真正的多轮对话。

use serde::{Deserialize, Serialize};

/// 消息角色（tool_result 仅出现在 ReAct 轨迹中）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolResult => "tool_result",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条消息，创建后不可变
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self::new(Role::ToolResult, content)
    }
}

/// 短期记忆：system + 最近 N 轮对话（每轮含 user + assistant，故实际保留约 max_turns*2 条消息）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    system: Option<Message>,
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            system: None,
            messages: Vec::new(),
            max_turns,
        }
    }

    /// 替换（或首次写入）system 消息
    pub fn set_system(&mut self, content: impl Into<String>) {
        self.system = Some(Message::system(content));
    }

    pub fn system(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    /// 不含 system 的对话消息
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 发送给 LLM 的完整消息列表：system 在前，其后按时间顺序
    pub fn to_llm_messages(&self) -> Vec<Message> {
        self.system
            .iter()
            .chain(self.messages.iter())
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.system = None;
        self.messages.clear();
    }

    /// 超出 max_turns*2 时丢弃最旧的消息，保留最近部分；等待回复的 user 消息额外保留，不会被裁掉
    fn prune(&mut self) {
        let pending = matches!(self.messages.last(), Some(m) if m.role == Role::User);
        let keep = self.max_turns * 2 + usize::from(pending);
        if self.messages.len() > keep {
            self.messages.drain(..self.messages.len() - keep);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
