//! Lab Agent - Rust 最小 ReAct 智能体运行时
//!
//! 模块划分：
//! - **agent**: 简单对话 Agent（带 / 不带记忆）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、状态机阶段
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 对话记忆与 ReAct 轨迹
//! - **observability**: tracing 订阅者与日志文件
//! - **prompt**: Prompt 模板与内置模板
//! - **react**: 输出解码、过程事件、ReAct 主循环
//! - **tools**: 工具注册表与内置工具（count_files、find_files、fire、ice）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompt;
pub mod react;
pub mod tools;

pub use agent::Agent;
pub use react::{ReactAgent, ReactOutcome, RunStatus, FINAL_ANSWER_MARKER};
