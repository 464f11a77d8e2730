//! Agent 错误类型
//!
//! 推理 / 解析 / 工具错误都被吸收进轨迹作为观察结果；只有模型传输失败、模板变量缺失与配置错误会从 execute 逃逸。

use thiserror::Error;

use crate::llm::LlmError;
use crate::prompt::TemplateError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Template error: {0}")]
    TemplateError(#[from] TemplateError),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}
