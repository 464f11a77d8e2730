//! 工具注册表
//!
//! 工具标识是封闭枚举 ToolName；每个工具实现 Tool trait（描述 / 参数 schema / 异步执行），
//! ToolRegistry 按标识注册与查找。invoke 对工具失败是"软"的：错误、参数不合法、超时、panic
//! 都转成文本观察结果返回给循环，而不是向上传播。

use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// 默认单次工具调用超时
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// 工具标识：注册表与 prompt 共享的封闭集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    CountFiles,
    FindFiles,
    Fire,
    Ice,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::CountFiles,
        ToolName::FindFiles,
        ToolName::Fire,
        ToolName::Ice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CountFiles => "count_files",
            ToolName::FindFiles => "find_files",
            ToolName::Fire => "fire",
            ToolName::Ice => "ice",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 大小写不敏感：`count_files`、`COUNT_FILES` 均可
impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "COUNT_FILES" => Ok(ToolName::CountFiles),
            "FIND_FILES" => Ok(ToolName::FindFiles),
            "FIRE" => Ok(ToolName::Fire),
            "ICE" => Ok(ToolName::Ice),
            _ => Err(ToolError::NotFound(s.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{0}' does not exist")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool execution failed: {0}")]
    Execution(String),

    #[error("tool '{0}' timed out")]
    Timeout(String),

    #[error("tool '{0}' panicked: {1}")]
    Panicked(String, String),
}

/// 工具 trait：描述（供 LLM 理解）、参数 schema、异步执行（input 为模型给出的 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认表示无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, input: Map<String, Value>) -> Result<String, ToolError>;
}

/// 将模型给出的 input 反序列化为工具的参数结构
pub fn parse_args<T: DeserializeOwned>(input: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(input))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// 由参数结构生成 JSON Schema
pub fn schema_of<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

/// 工具注册表：同名重复注册以最后一次为准
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// 注册工具，返回被覆盖的旧工具（若有）
    pub fn register(&mut self, name: ToolName, tool: impl Tool + 'static) -> Option<Arc<dyn Tool>> {
        self.register_arc(name, Arc::new(tool))
    }

    pub fn register_arc(&mut self, name: ToolName, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let previous = self.tools.insert(name, tool);
        if previous.is_some() {
            tracing::debug!(tool = %name, "tool re-registered, previous registration replaced");
        }
        previous
    }

    pub fn resolve(&self, name: ToolName) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(&name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// 按模型给出的字符串查找：先映射到枚举，再查注册表
    pub fn resolve_name(&self, raw: &str) -> Result<(ToolName, Arc<dyn Tool>), ToolError> {
        let name: ToolName = raw.parse()?;
        let tool = self.resolve(name)?;
        Ok((name, tool))
    }

    pub fn contains(&self, name: ToolName) -> bool {
        self.tools.contains_key(&name)
    }

    pub fn tool_names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 每个已注册工具一行，供 prompt 的 Available tools 段落使用；按枚举声明顺序
    pub fn describe_all(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|(name, tool)| {
                format!(
                    "tool_name:{}|tool_description:{}|parameters:{}",
                    name,
                    tool.description(),
                    tool.parameters_schema()
                )
            })
            .collect()
    }

    /// 调用工具并把结果转为文本；任何失败都以错误描述作为观察结果返回
    pub async fn invoke(&self, name: ToolName, input: Map<String, Value>) -> String {
        let start = Instant::now();
        let args_preview = args_preview(&input);

        let result = match self.resolve(name) {
            Ok(tool) => {
                // 在阻塞线程池上驱动工具 future：同步阻塞的工具也受超时约束，且不占用异步工作线程
                let handle = tokio::runtime::Handle::current();
                let task = tokio::task::spawn_blocking(move || {
                    handle.block_on(AssertUnwindSafe(tool.execute(input)).catch_unwind())
                });
                match tokio::time::timeout(self.timeout, task).await {
                    Ok(Ok(Ok(r))) => r,
                    Ok(Ok(Err(panic))) => Err(ToolError::Panicked(
                        name.to_string(),
                        panic_message(panic.as_ref()),
                    )),
                    Ok(Err(join)) => Err(ToolError::Execution(format!("tool task failed: {}", join))),
                    Err(_) => Err(ToolError::Timeout(name.to_string())),
                }
            }
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::Timeout(_)) => "timeout",
            Err(ToolError::Panicked(..)) => "panic",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name.as_str(),
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(observation) => observation,
            Err(e) => e.to_string(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn args_preview(input: &Map<String, Value>) -> String {
    let s = Value::Object(input.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
