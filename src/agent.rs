//! 简单对话 Agent
//!
//! 持有一个 LLM 客户端与一个 PromptTemplate：
//! - respond_with_memory：真正的多轮对话记忆（system + 历史 user/assistant 全量发送）
//! - respond_without_memory：每次构建全新的 system + user 两条消息，不做任何持久化
//!
//! ReactAgent 复用 respond_without_memory 作为思考步骤的模型调用。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{ConversationMemory, Message};
use crate::prompt::{PromptTemplate, PromptVars};

/// 默认保留的对话轮数
const DEFAULT_MAX_TURNS: usize = 20;

pub struct Agent {
    name: String,
    llm: Arc<dyn LlmClient>,
    prompt: PromptTemplate,
    memory: ConversationMemory,
    /// 上一次渲染 system 时使用的变量
    system_vars: Option<PromptVars>,
}

impl Agent {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LlmClient>, prompt: PromptTemplate) -> Self {
        Self {
            name: name.into(),
            llm,
            prompt,
            memory: ConversationMemory::new(DEFAULT_MAX_TURNS),
            system_vars: None,
        }
    }

    /// 按配置构建：名称取 [app].name，记忆上限取 [app].max_context_turns
    pub fn from_config(cfg: &AppConfig, llm: Arc<dyn LlmClient>, prompt: PromptTemplate) -> Self {
        Self::new(cfg.app.name.clone(), llm, prompt).with_max_turns(cfg.app.max_context_turns)
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.memory = ConversationMemory::new(max_turns);
        self.system_vars = None;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: PromptTemplate) {
        self.prompt = prompt;
        self.system_vars = None;
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 当前对话记忆（含 system）
    pub fn messages(&self) -> Vec<Message> {
        self.memory.to_llm_messages()
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
        self.system_vars = None;
    }

    /// 变量变化（或尚无 system）时重新渲染 system；空变量表表示沿用上一次的 system
    fn refresh_system(&mut self, vars: &PromptVars) -> Result<(), AgentError> {
        let has_system = self.memory.system().is_some();
        let unchanged = self.system_vars.as_ref() == Some(vars);
        if has_system && (unchanged || vars.is_empty()) {
            return Ok(());
        }
        let system = self.prompt.render_system(vars)?;
        self.memory.set_system(system);
        self.system_vars = Some(vars.clone());
        tracing::debug!(agent = %self.name, "system prompt regenerated");
        Ok(())
    }

    /// 多轮对话：追加 user，必要时刷新 system，发送全部消息，追加 assistant 回复
    pub async fn respond_with_memory(
        &mut self,
        query: &str,
        vars: &PromptVars,
    ) -> Result<String, AgentError> {
        self.refresh_system(vars)?;
        self.memory.push(Message::user(query));
        let response = self.llm.complete(&self.memory.to_llm_messages()).await?;
        self.memory.push(Message::assistant(response.clone()));
        Ok(response)
    }

    /// 单轮调用：system + user，调用后即丢弃
    pub async fn respond_without_memory(
        &self,
        query: &str,
        vars: &PromptVars,
    ) -> Result<String, AgentError> {
        let messages = [
            Message::system(self.prompt.render_system(vars)?),
            Message::user(query),
        ];
        Ok(self.llm.complete(&messages).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::memory::Role;
    use crate::prompt::{chat_prompt, vars, TemplateError};

    #[tokio::test]
    async fn test_respond_with_memory_keeps_history() {
        let mock = Arc::new(MockLlmClient::with_responses(["hello ciro", "you are ciro"]));
        let mut agent = Agent::new("lab", mock.clone(), chat_prompt());
        let v = vars([("name", "puppy")]);

        agent.respond_with_memory("hi, I am ciro", &v).await.unwrap();
        let reply = agent.respond_with_memory("what is my name", &v).await.unwrap();
        assert_eq!(reply, "you are ciro");

        let second = &mock.calls()[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[0].role, Role::System);
        assert!(second[0].content.contains("puppy"));
        assert_eq!(second[1].content, "hi, I am ciro");
        assert_eq!(second[2].content, "hello ciro");
        assert_eq!(second[3].content, "what is my name");
        assert_eq!(agent.messages().len(), 5);
    }

    #[tokio::test]
    async fn test_system_regenerated_when_vars_change() {
        let mock = Arc::new(MockLlmClient::with_responses(["a", "b", "c"]));
        let mut agent = Agent::new("lab", mock.clone(), chat_prompt());

        agent.respond_with_memory("q1", &vars([("name", "puppy")])).await.unwrap();
        agent.respond_with_memory("q2", &PromptVars::new()).await.unwrap();
        assert!(mock.calls()[1][0].content.contains("puppy"));

        agent.respond_with_memory("q3", &vars([("name", "kitten")])).await.unwrap();
        let third = &mock.calls()[2];
        assert!(third[0].content.contains("kitten"));
        assert_eq!(third.iter().filter(|m| m.role == Role::System).count(), 1);
    }

    #[tokio::test]
    async fn test_respond_without_memory_is_stateless() {
        let mock = Arc::new(MockLlmClient::with_responses(["x", "y"]));
        let agent = Agent::new("lab", mock.clone(), chat_prompt());
        let v = vars([("name", "puppy")]);

        agent.respond_without_memory("one", &v).await.unwrap();
        agent.respond_without_memory("two", &v).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[1].len(), 2);
        assert_eq!(calls[1][1], Message::user("two"));
        assert!(agent.messages().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_applies_context_turns() {
        let mut cfg = AppConfig::default();
        cfg.app.name = "puppy".into();
        cfg.app.max_context_turns = 1;
        let mock = Arc::new(MockLlmClient::with_responses(["a1", "a2", "a3"]));
        let mut agent = Agent::from_config(&cfg, mock.clone(), chat_prompt());
        assert_eq!(agent.name(), "puppy");

        let v = vars([("name", "puppy")]);
        for q in ["q1", "q2", "q3"] {
            agent.respond_with_memory(q, &v).await.unwrap();
        }

        let third = &mock.calls()[2];
        let contents: Vec<&str> = third.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(third.len(), 4);
        assert_eq!(&contents[1..], ["q2", "a2", "q3"]);
    }

    #[tokio::test]
    async fn test_zero_turn_memory_still_sends_query() {
        let mock = Arc::new(MockLlmClient::with_responses(["a1"]));
        let mut agent = Agent::new("lab", mock.clone(), chat_prompt()).with_max_turns(0);
        agent
            .respond_with_memory("hello", &vars([("name", "puppy")]))
            .await
            .unwrap();

        let sent = &mock.calls()[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], Message::user("hello"));
    }

    #[tokio::test]
    async fn test_missing_system_variable_fails() {
        let mock = Arc::new(MockLlmClient::new());
        let mut agent = Agent::new("lab", mock.clone(), chat_prompt());
        let err = agent
            .respond_with_memory("hi", &PromptVars::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::TemplateError(TemplateError::MissingVariable(ref v)) if v == "name"
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Transport("connection refused".into()));
        let agent = Agent::new("lab", mock, chat_prompt());
        let err = agent
            .respond_without_memory("hi", &vars([("name", "n")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::LlmError(LlmError::Transport(_))));
    }
}
