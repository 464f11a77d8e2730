//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use deepseek::{create_deepseek_client, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError};

use crate::config::AppConfig;

/// 按 [llm].provider 构建客户端；未知 provider 回退到 DeepSeek
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let llm = &cfg.llm;
    match llm.provider.to_lowercase().as_str() {
        "mock" => Arc::new(MockLlmClient::new()),
        "openai" => Arc::new(OpenAiClient::new(
            llm.base_url.as_deref(),
            &llm.model,
            llm.api_key.as_deref(),
        )),
        other => {
            if other != "deepseek" {
                tracing::warn!(provider = %other, "unknown llm provider, falling back to deepseek");
            }
            Arc::new(create_deepseek_client(
                Some(&llm.model),
                llm.base_url.as_deref(),
                llm.api_key.as_deref(),
            ))
        }
    }
}
