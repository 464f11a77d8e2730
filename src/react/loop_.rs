//! ReAct 主循环
//!
//! Think -> Decide -> Act -> Think ... 直到 Answered 或 Exhausted。
//! 每一步返回下一个 Step，由 run 中的显式循环驱动（不做 think/decide/act 互相递归）。
//! 迭代预算在每次 Think 开头检查：计数达到上限即终止，否则计数加一并调用模型，
//! 因此单次运行最多调用模型 max_iterations 次。
//!
//! 记忆压缩：思考 prompt 内联整段轨迹文本（`role: content` 行），模型调用本身只发送 system + user 两条消息。
//! 轨迹与迭代计数在每次 run 开始时重置；上一次运行的轨迹在下一次运行前可通过 `trace()` 读取。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::AppConfig;
use crate::core::{AgentError, Step};
use crate::llm::LlmClient;
use crate::memory::{Role, Trace};
use crate::prompt::{react_prompt, vars, PromptTemplate, PromptVars};
use crate::react::decode::{Decision, OutputDecoder};
use crate::react::events::{preview, EventSink, ReactEvent};
use crate::tools::{Tool, ToolName, ToolRegistry};

/// execute 返回值的前缀
pub const FINAL_ANSWER_MARKER: &str = "\n\n*********final answer*********:";

/// 默认迭代预算
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

const DEFAULT_AGENT_NAME: &str = "react";

/// 运行的终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Answered,
    Exhausted,
}

/// 单次运行结果
#[derive(Debug, Clone)]
pub struct ReactOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// 轨迹最后一条消息的内容（Answered 时为回答，Exhausted 时为终止说明）
    pub answer: String,
    /// 实际调用模型的次数
    pub iterations: usize,
    pub trace: Trace,
}

pub struct ReactAgent {
    base: Agent,
    tools: ToolRegistry,
    decoder: OutputDecoder,
    max_iterations: usize,
    iteration: usize,
    trace: Trace,
    events: EventSink,
}

impl ReactAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            base: Agent::new(DEFAULT_AGENT_NAME, llm, react_prompt()),
            tools: ToolRegistry::new(),
            decoder: OutputDecoder::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            iteration: 0,
            trace: Trace::new(),
            events: EventSink::default(),
        }
    }

    /// 按配置构建：名称、迭代预算、解析策略、工具超时、可选的 prompt 文件
    pub fn from_config(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> Result<Self, AgentError> {
        let mut prompt = react_prompt();
        if let Some(path) = &cfg.agent.react_prompt_path {
            prompt = prompt.user_from_file(path)?;
        }
        Ok(Self::new(llm)
            .with_name(cfg.app.name.clone())
            .with_prompt(prompt)
            .with_max_iterations(cfg.agent.max_iterations)
            .with_decoder(OutputDecoder::new(cfg.agent.parse_mode, cfg.agent.case_fold))
            .with_tool_timeout(Duration::from_secs(cfg.tools.timeout_secs)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.base.set_name(name);
        self
    }

    /// 替换思考模板；user 模板需声明 query / history / tools
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.base.set_prompt(prompt);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_decoder(mut self, decoder: OutputDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tools.set_timeout(timeout);
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.events = EventSink::new(Some(tx));
        self
    }

    /// 注册工具（同名覆盖）
    pub fn set_tool(&mut self, name: ToolName, tool: impl Tool + 'static) {
        self.tools.register(name, tool);
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// 当前（或最近一次）运行已消耗的迭代数
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// 运行整个状态机，返回带终止标记的最终文本
    pub async fn execute(&mut self, query: &str) -> Result<String, AgentError> {
        let outcome = self.run(query).await?;
        let final_answer = format!("{}{}", FINAL_ANSWER_MARKER, outcome.answer);
        tracing::info!(run_id = %outcome.run_id, status = ?outcome.status, "{}", final_answer);
        Ok(final_answer)
    }

    /// 运行整个状态机，返回结构化结果；仅模型传输失败与模板变量缺失会返回 Err
    pub async fn run(&mut self, query: &str) -> Result<ReactOutcome, AgentError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("react_run", run_id = %run_id, agent = %self.base.name());
        let status = self.drive(query).instrument(span).await?;
        Ok(ReactOutcome {
            run_id,
            status,
            answer: self
                .trace
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            iterations: self.iteration,
            trace: self.trace.clone(),
        })
    }

    async fn drive(&mut self, query: &str) -> Result<RunStatus, AgentError> {
        self.trace = Trace::new();
        self.iteration = 0;

        let mut step = Step::Think;
        loop {
            tracing::trace!(phase = ?step.phase(), iteration = self.iteration, "step");
            step = match step {
                Step::Think => self.think(query).await?,
                Step::Decide { raw } => self.decide(&raw),
                Step::Act { tool, input } => self.act(tool, input).await,
                Step::Answered => return Ok(RunStatus::Answered),
                Step::Exhausted => return Ok(RunStatus::Exhausted),
            };
        }
    }

    fn record(&mut self, role: Role, content: impl Into<String>) {
        let content = content.into();
        tracing::info!(role = %role, content = %preview(&content), "trace");
        self.trace.push(role, content);
    }

    /// 检查预算；渲染思考 prompt（query + 轨迹 + 工具描述）并调用模型，原始输出写入轨迹
    async fn think(&mut self, query: &str) -> Result<Step, AgentError> {
        if self.iteration >= self.max_iterations {
            self.record(
                Role::System,
                format!(
                    "Stopped: reached the maximum of {} iterations",
                    self.max_iterations
                ),
            );
            self.events.emit(ReactEvent::Exhausted {
                iterations: self.iteration,
            });
            return Ok(Step::Exhausted);
        }
        self.iteration += 1;
        self.events.emit(ReactEvent::IterationStarted {
            iteration: self.iteration,
            max_iterations: self.max_iterations,
        });

        let prompt = self.base.prompt().render_user(&vars([
            ("query", query.to_string()),
            ("history", self.trace.render()),
            ("tools", self.tools_section()),
        ]))?;
        tracing::debug!(prompt = %prompt, "think prompt");

        self.events.emit(ReactEvent::Thinking);
        let output = self
            .base
            .respond_without_memory(&prompt, &PromptVars::new())
            .await?;
        self.record(Role::Assistant, output.clone());
        self.events.emit(ReactEvent::ModelOutput {
            text: preview(&output),
        });
        Ok(Step::Decide { raw: output })
    }

    fn tools_section(&self) -> String {
        let lines = self.tools.describe_all();
        if lines.is_empty() {
            return "(no tools available)".to_string();
        }
        lines.iter().map(|l| format!("\n- {}", l)).collect()
    }

    /// 解析模型输出：已注册的工具 -> Act；回答 -> Answered；未知工具或解析失败 -> 写入说明后重新 Think
    fn decide(&mut self, raw: &str) -> Step {
        match self.decoder.decode(raw) {
            Ok(Decision::Action {
                name,
                reason,
                input,
            }) => {
                let requested = name.unwrap_or_default();
                match self.tools.resolve_name(&requested) {
                    Ok((tool, _)) => {
                        self.record(Role::Assistant, format!("Using tool: {}", tool));
                        self.events.emit(ReactEvent::ToolSelected {
                            tool,
                            reason,
                            input: Value::Object(input.clone()),
                        });
                        Step::Act { tool, input }
                    }
                    Err(_) => {
                        self.record(
                            Role::Assistant,
                            format!(
                                "Warning: tool '{}' does not exist; noted for re-thinking",
                                requested
                            ),
                        );
                        self.events.emit(ReactEvent::ToolNotFound { tool: requested });
                        Step::Think
                    }
                }
            }
            Ok(Decision::Answer(answer)) => {
                self.record(Role::Assistant, answer.clone());
                self.events.emit(ReactEvent::Answered { answer });
                Step::Answered
            }
            Err(e) => {
                self.record(
                    Role::Assistant,
                    format!("Failed to parse the response, please try again: {}", e),
                );
                self.events.emit(ReactEvent::DecodeFailed {
                    error: e.to_string(),
                });
                Step::Think
            }
        }
    }

    /// 执行工具并把观察结果写入轨迹；无论成败都回到 Think
    async fn act(&mut self, tool: ToolName, input: Map<String, Value>) -> Step {
        if !self.tools.contains(tool) {
            self.record(Role::Assistant, format!("{} does not exist!", tool));
            self.events.emit(ReactEvent::ToolNotFound {
                tool: tool.to_string(),
            });
            return Step::Think;
        }
        let observation = self.tools.invoke(tool, input).await;
        self.events.emit(ReactEvent::Observation {
            tool,
            preview: preview(&observation),
        });
        self.record(
            Role::ToolResult,
            format!("from: {} result: {}", tool, observation),
        );
        Step::Think
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::ToolError;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn description(&self) -> &str {
            "echo input"
        }

        async fn execute(&self, input: Map<String, Value>) -> Result<String, ToolError> {
            Ok(Value::Object(input).to_string())
        }
    }

    fn agent_with(responses: &[&str]) -> (ReactAgent, Arc<MockLlmClient>) {
        let mock = Arc::new(MockLlmClient::with_responses(responses.iter().copied()));
        let mut agent = ReactAgent::new(mock.clone());
        agent.set_tool(ToolName::Fire, Echo);
        (agent, mock)
    }

    #[tokio::test]
    async fn test_answer_ends_run_without_extra_iteration() {
        let (mut agent, mock) = agent_with(&[r#"{"thought": "easy", "answer": "x"}"#]);
        let outcome = agent.run("q").await.unwrap();
        assert_eq!(outcome.status, RunStatus::Answered);
        assert_eq!(outcome.answer, "x");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(agent.trace().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_consumes_one_iteration() {
        let (mut agent, mock) = agent_with(&[
            r#"{"action": {"name": "UNKNOWN_TOOL", "input": {}}}"#,
            r#"{"answer": "done"}"#,
        ]);
        let outcome = agent.run("q").await.unwrap();
        assert_eq!(outcome.iterations, 2);
        let trace = agent.trace().messages();
        assert!(trace[1].content.contains("'unknown_tool' does not exist"));

        let second_prompt = &mock.calls()[1][1].content;
        assert!(second_prompt.contains("does not exist"));
    }

    #[tokio::test]
    async fn test_zero_budget_exhausts_without_model_call() {
        let (mut agent, mock) = agent_with(&[]);
        agent = agent.with_max_iterations(0);
        let outcome = agent.run("q").await.unwrap();
        assert_eq!(outcome.status, RunStatus::Exhausted);
        assert_eq!(mock.call_count(), 0);
        assert_eq!(agent.trace().len(), 1);
        assert_eq!(agent.trace().messages()[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_act_on_unregistered_tool_returns_to_think() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (agent, mock) = agent_with(&[]);
        let mut agent = agent.with_event_tx(tx);

        let next = agent.act(ToolName::Ice, Map::new()).await;
        assert_eq!(next, Step::Think);
        assert_eq!(agent.trace().len(), 1);
        assert_eq!(agent.trace().messages()[0].role, Role::Assistant);
        assert_eq!(agent.trace().messages()[0].content, "ice does not exist!");
        assert!(matches!(
            rx.try_recv(),
            Ok(ReactEvent::ToolNotFound { ref tool }) if tool == "ice"
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_state_resets_between_runs() {
        let (mut agent, _mock) = agent_with(&[
            r#"{"action": {"name": "fire", "input": {"skill": "a"}}}"#,
            r#"{"answer": "first"}"#,
            r#"{"answer": "second"}"#,
        ]);
        agent.run("one").await.unwrap();
        assert_eq!(agent.trace().len(), 5);

        let outcome = agent.run("two").await.unwrap();
        assert_eq!(outcome.answer, "second");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(agent.trace().len(), 2);
    }

    #[tokio::test]
    async fn test_prompt_lists_live_registry() {
        let (mut agent, mock) = agent_with(&[r#"{"answer": "ok"}"#]);
        agent.run("q").await.unwrap();
        let prompt = &mock.calls()[0][1].content;
        assert!(prompt.contains("tool_name:fire|tool_description:echo input"));
        assert!(!prompt.contains("tool_name:ice"));
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (agent, _mock) = agent_with(&[
            r#"{"action": {"name": "fire", "input": {}}}"#,
            r#"{"answer": "ok"}"#,
        ]);
        let mut agent = agent.with_event_tx(tx);
        agent.run("q").await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            [
                "iteration_started",
                "thinking",
                "model_output",
                "tool_selected",
                "observation",
                "iteration_started",
                "thinking",
                "model_output",
                "answered"
            ]
        );
    }
}
