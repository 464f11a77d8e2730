//! ReactAgent 集成测试：Mock LLM 脚本驱动完整的 Think / Decide / Act 循环

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use lab_agent::config::{AppConfig, CaseFold, ParseMode};
use lab_agent::core::AgentError;
use lab_agent::llm::{LlmError, MockLlmClient};
use lab_agent::memory::Role;
use lab_agent::prompt::{PromptTemplate, TemplateError};
use lab_agent::react::OutputDecoder;
use lab_agent::tools::{CountFilesTool, FindFilesTool, Tool, ToolError, ToolName};
use lab_agent::{ReactAgent, RunStatus, FINAL_ANSWER_MARKER};

fn fixture_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.py", "b.py", "notes.txt"] {
        std::fs::write(dir.path().join(name), "x").unwrap();
    }
    dir
}

fn count_action(path: &str) -> String {
    serde_json::json!({
        "thought": "I need to count the python files",
        "action": {
            "name": "COUNT_FILES",
            "reason": "count *.py",
            "input": {"path": path, "file_pattern": "*.py"}
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_count_files_scenario() {
    let dir = fixture_dir();
    let path = dir.path().to_string_lossy().to_string();
    let mock = Arc::new(MockLlmClient::with_responses([
        count_action(&path),
        r#"{"thought": "done", "answer": "There are 2 python files."}"#.to_string(),
    ]));

    let mut agent = ReactAgent::new(mock.clone())
        .with_decoder(OutputDecoder::new(ParseMode::Lenient, CaseFold::Identifiers));
    agent.set_tool(ToolName::CountFiles, CountFilesTool::default());
    agent.set_tool(ToolName::FindFiles, FindFilesTool);

    let result = agent
        .execute("How many python files are in the directory?")
        .await
        .unwrap();
    assert_eq!(
        result,
        format!("{}There are 2 python files.", FINAL_ANSWER_MARKER)
    );

    let trace = agent.trace().messages();
    assert_eq!(trace.len(), 5);
    assert_eq!(trace[1].content, "Using tool: count_files");
    assert_eq!(trace[2].role, Role::ToolResult);
    assert!(trace[2].content.starts_with("from: count_files result: "));
    assert!(trace[2].content.contains("\"total\":2"));
    assert_eq!(agent.iteration(), 2);

    // 第二次思考的 prompt 内联了第一次的观察结果
    let second_prompt = &mock.calls()[1][1].content;
    assert!(second_prompt.contains("tool_result: from: count_files result:"));
}

#[tokio::test]
async fn test_full_case_fold_lowercases_answer() {
    let mock = Arc::new(MockLlmClient::with_responses([
        r#"```json
{"Thought": "easy", "Answer": "Paris"}
```"#,
    ]));
    let mut agent = ReactAgent::new(mock);
    let outcome = agent.run("capital of france?").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Answered);
    assert_eq!(outcome.answer, "paris");
}

#[tokio::test]
async fn test_exhaustion_never_exceeds_budget() {
    for max in 0..4 {
        let mock = Arc::new(MockLlmClient::new());
        for _ in 0..10 {
            mock.push_response(r#"{"action": {"name": "fire", "input": {"skill": "x"}}}"#);
        }
        let mut agent = ReactAgent::new(mock.clone()).with_max_iterations(max);
        agent.set_tool(ToolName::Fire, lab_agent::tools::FireSkillTool);

        let outcome = agent.run("keep going").await.unwrap();
        assert_eq!(outcome.status, RunStatus::Exhausted);
        assert_eq!(outcome.iterations, max);
        assert_eq!(mock.call_count(), max);
        assert!(outcome.answer.contains("maximum"));
    }
}

#[tokio::test]
async fn test_single_iteration_ends_after_tool_action() {
    let mock = Arc::new(MockLlmClient::with_responses([
        r#"{"action": {"name": "ice", "input": {"skill": "frost"}}}"#,
    ]));
    let mut agent = ReactAgent::new(mock.clone()).with_max_iterations(1);
    agent.set_tool(ToolName::Ice, lab_agent::tools::IceSkillTool);

    let outcome = agent.run("attack").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Exhausted);
    assert_eq!(mock.call_count(), 1);
    let roles: Vec<Role> = outcome.trace.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::Assistant, Role::Assistant, Role::ToolResult, Role::System]
    );
}

struct Exploding;

#[async_trait]
impl Tool for Exploding {
    fn description(&self) -> &str {
        "always fails"
    }

    async fn execute(&self, _input: Map<String, Value>) -> Result<String, ToolError> {
        panic!("boom");
    }
}

struct Sleepy;

#[async_trait]
impl Tool for Sleepy {
    fn description(&self) -> &str {
        "never finishes in time"
    }

    async fn execute(&self, _input: Map<String, Value>) -> Result<String, ToolError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("late".into())
    }
}

#[tokio::test]
async fn test_failing_tools_become_observations() {
    let mock = Arc::new(MockLlmClient::with_responses([
        r#"{"action": {"name": "fire", "input": {}}}"#,
        r#"{"action": {"name": "ice", "input": {}}}"#,
        r#"{"answer": "recovered"}"#,
    ]));
    let mut agent = ReactAgent::new(mock).with_tool_timeout(Duration::from_millis(50));
    agent.set_tool(ToolName::Fire, Exploding);
    agent.set_tool(ToolName::Ice, Sleepy);

    let outcome = agent.run("try tools").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Answered);
    assert_eq!(outcome.answer, "recovered");

    let observations: Vec<&str> = outcome
        .trace
        .messages()
        .iter()
        .filter(|m| m.role == Role::ToolResult)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(observations.len(), 2);
    assert!(observations[0].contains("panicked"));
    assert!(observations[1].contains("timed out"));
}

#[tokio::test]
async fn test_strict_mode_rethinks_on_malformed_output() {
    let mock = Arc::new(MockLlmClient::with_responses([
        "Sure! {'answer': 'maybe'}",
        r#"{"answer": "certainly"}"#,
    ]));
    let mut agent = ReactAgent::new(mock.clone())
        .with_decoder(OutputDecoder::new(ParseMode::Strict, CaseFold::Full));

    let outcome = agent.run("q").await.unwrap();
    assert_eq!(outcome.answer, "certainly");
    assert_eq!(outcome.iterations, 2);
    assert!(outcome.trace.messages()[1]
        .content
        .starts_with("Failed to parse the response"));
}

#[tokio::test]
async fn test_transport_failure_escapes_execute() {
    let mock = Arc::new(MockLlmClient::new());
    mock.push_error(LlmError::Transport("connection reset".into()));
    let mut agent = ReactAgent::new(mock);

    let err = agent.execute("q").await.unwrap_err();
    assert!(matches!(err, AgentError::LlmError(LlmError::Transport(_))));
}

#[tokio::test]
async fn test_missing_template_variable_escapes_execute() {
    let mock = Arc::new(MockLlmClient::new());
    let mut agent = ReactAgent::new(mock.clone())
        .with_prompt(PromptTemplate::new().with_user("Q: ${query} ${persona}"));

    let err = agent.execute("q").await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::TemplateError(TemplateError::MissingVariable(ref v)) if v == "persona"
    ));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_from_config_uses_prompt_file_and_budget() {
    let dir = tempfile::tempdir().unwrap();
    let prompt_path = dir.path().join("react.txt");
    std::fs::write(&prompt_path, "Q=${query}\nH=${history}\nT=${tools}").unwrap();

    let mut cfg = AppConfig::default();
    cfg.app.name = "lab".into();
    cfg.agent.max_iterations = 2;
    cfg.agent.react_prompt_path = Some(prompt_path);

    let mock = Arc::new(MockLlmClient::with_responses([r#"{"answer": "ok"}"#]));
    let mut agent = ReactAgent::from_config(&cfg, mock.clone()).unwrap();
    assert_eq!(agent.name(), "lab");
    assert_eq!(agent.max_iterations(), 2);

    agent.run("hello").await.unwrap();
    let prompt = &mock.calls()[0][1].content;
    assert!(prompt.starts_with("Q=hello\nH=\nT="));
    assert!(prompt.contains("(no tools available)"));
}

#[tokio::test]
async fn test_concurrent_agents_are_independent() {
    let dir = fixture_dir();
    let path = dir.path().to_string_lossy().to_string();

    let mock_a = Arc::new(MockLlmClient::with_responses([
        count_action(&path),
        r#"{"answer": "two"}"#.to_string(),
    ]));
    let mock_b = Arc::new(MockLlmClient::with_responses([r#"{"answer": "direct"}"#]));

    let mut a = ReactAgent::new(mock_a)
        .with_decoder(OutputDecoder::new(ParseMode::Lenient, CaseFold::Identifiers));
    a.set_tool(ToolName::CountFiles, CountFilesTool::default());
    let mut b = ReactAgent::new(mock_b);

    let (ra, rb) = tokio::join!(a.run("count"), b.run("answer"));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.answer, "two");
    assert_eq!(ra.trace.len(), 5);
    assert_eq!(rb.answer, "direct");
    assert_eq!(rb.trace.len(), 2);
    assert_ne!(ra.run_id, rb.run_id);
}
