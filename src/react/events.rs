//! ReAct 过程事件：状态机每次转移都会通知观察者（日志 + 可选通道），状态机本身不直接做控制台输出

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::tools::ToolName;

/// 预览最大字符数
const PREVIEW_CHARS: usize = 300;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 新一轮思考开始（iteration 从 1 计）
    IterationStarted { iteration: usize, max_iterations: usize },
    /// 正在调用 LLM
    Thinking,
    /// LLM 原始输出（预览）
    ModelOutput { text: String },
    ToolSelected {
        tool: ToolName,
        reason: Option<String>,
        input: serde_json::Value,
    },
    /// 模型请求了未注册的工具
    ToolNotFound { tool: String },
    /// 输出无法解析为 action / answer
    DecodeFailed { error: String },
    Observation { tool: ToolName, preview: String },
    Answered { answer: String },
    /// 迭代预算耗尽
    Exhausted { iterations: usize },
}

/// 事件观察者：记录 tracing 日志，并在设置了通道时转发
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<ReactEvent>>,
}

impl EventSink {
    pub fn new(tx: Option<UnboundedSender<ReactEvent>>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: ReactEvent) {
        match &event {
            ReactEvent::IterationStarted { iteration, max_iterations } => {
                tracing::info!(iteration, max_iterations, "iteration started")
            }
            ReactEvent::ToolNotFound { tool } => tracing::warn!(tool = %tool, "tool does not exist"),
            ReactEvent::DecodeFailed { error } => {
                tracing::warn!(error = %error, "failed to decode model output")
            }
            ReactEvent::Exhausted { iterations } => {
                tracing::warn!(iterations, "iteration budget exhausted")
            }
            other => tracing::debug!(event = ?other, "react event"),
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// 截断为预览
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
