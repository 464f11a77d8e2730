//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `LAB__*` 覆盖（双下划线表示嵌套，如 `LAB__AGENT__MAX_ITERATIONS=8`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub logging: LoggingSection,
}

/// [app] 段：Agent 名称（用于日志文件名）、简单 Agent 的对话轮数上限
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            max_context_turns: default_max_context_turns(),
        }
    }
}

fn default_app_name() -> String {
    "react".to_string()
}

fn default_max_context_turns() -> usize {
    20
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 DEEPSEEK_API_KEY / OPENAI_API_KEY
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    crate::llm::DEEPSEEK_CHAT.to_string()
}

/// 模型输出的解析策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// 容错解析：剥离代码块、修复尾逗号 / 单引号 / 未闭合括号等
    #[default]
    Lenient,
    /// 严格 JSON
    Strict,
}

/// 解析前的大小写归一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseFold {
    /// 整段输出转小写后再解析（回答内容也会被转为小写）
    #[default]
    Full,
    /// 只将键名与工具名转小写，保留参数值与回答原样
    Identifiers,
}

/// [agent] 段：ReAct 迭代预算与解析策略
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub parse_mode: ParseMode,
    #[serde(default)]
    pub case_fold: CaseFold,
    /// 覆盖内置 ReAct user 模板的文件
    pub react_prompt_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            parse_mode: ParseMode::default(),
            case_fold: CaseFold::default(),
            react_prompt_path: None,
        }
    }
}

fn default_max_iterations() -> usize {
    5
}

/// [tools] 段：单次工具调用超时、count_files 示例文件数
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_sample_files")]
    pub sample_files: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
            sample_files: default_sample_files(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_sample_files() -> usize {
    5
}

/// [logging] 段：设置 log_dir 时额外写入按时间命名的日志文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<PathBuf>,
}

/// 从 config 目录加载配置，环境变量 LAB__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 LAB__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("LAB")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
