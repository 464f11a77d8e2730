//! 本地文件检索工具：count_files / find_files
//!
//! 在指定目录下按通配符（`*.py`、`data_??.csv`）匹配文件；支持相对路径、绝对路径与 `~`，可递归。
//! `*` 也匹配以 `.` 开头的隐藏文件。目录遍历在阻塞线程池上执行，递归深度与结果数有上限。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::tools::{parse_args, schema_of, Tool, ToolError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// 递归遍历的最大深度
const MAX_DEPTH: usize = 10;

/// 单次检索最多收集的文件数
const MAX_RESULTS: usize = 10_000;

/// count_files / find_files 共用参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FileSearchArgs {
    /// 要搜索的目录，默认当前目录；支持 `~/Documents` 形式
    #[serde(default = "default_path")]
    pub path: String,
    /// 文件名通配符，默认 `*`
    #[serde(default = "default_pattern")]
    pub file_pattern: String,
    /// 是否递归子目录
    #[serde(default, deserialize_with = "lenient_bool")]
    #[schemars(with = "bool")]
    pub recursive: bool,
}

fn default_path() -> String {
    ".".to_string()
}

fn default_pattern() -> String {
    "*".to_string()
}

/// 模型常把布尔值写成字符串："true" / "false" / "1" / "0"
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected boolean, got '{other}'"))),
        },
        other => Err(serde::de::Error::custom(format!("expected boolean, got {other}"))),
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(path.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

/// 匹配结果：根目录、按路径排序的文件、是否因达到上限而截断
struct Matches {
    root: PathBuf,
    files: Vec<PathBuf>,
    truncated: bool,
}

/// 在阻塞线程池上执行目录遍历
async fn search(args: FileSearchArgs) -> Result<Matches, ToolError> {
    tokio::task::spawn_blocking(move || collect_matches(&args))
        .await
        .map_err(|e| ToolError::Execution(format!("search task failed: {}", e)))?
}

/// 解析目录并收集匹配的文件（按路径排序）
fn collect_matches(args: &FileSearchArgs) -> Result<Matches, ToolError> {
    let root = expand_home(&args.path);
    let root = root
        .canonicalize()
        .map_err(|_| ToolError::Execution(format!("path does not exist: {}", args.path)))?;
    if !root.is_dir() {
        return Err(ToolError::Execution(format!("not a directory: {}", args.path)));
    }
    let pattern = Pattern::new(&args.file_pattern)
        .map_err(|e| ToolError::InvalidArguments(format!("bad file_pattern: {}", e)))?;
    let match_relative = args.file_pattern.contains('/');

    let is_match = |path: &Path| -> bool {
        if match_relative {
            path.strip_prefix(&root)
                .map(|rel| pattern.matches_path_with(rel, MATCH_OPTIONS))
                .unwrap_or(false)
        } else {
            path.file_name()
                .map(|n| pattern.matches_with(&n.to_string_lossy(), MATCH_OPTIONS))
                .unwrap_or(false)
        }
    };

    let mut files = Vec::new();
    let mut truncated = false;
    if args.recursive {
        for entry in walkdir::WalkDir::new(&root)
            .min_depth(1)
            .max_depth(MAX_DEPTH)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if files.len() >= MAX_RESULTS {
                truncated = true;
                break;
            }
            if entry.file_type().is_file() && is_match(entry.path()) {
                files.push(entry.into_path());
            }
        }
    } else {
        let entries = std::fs::read_dir(&root)
            .map_err(|e| ToolError::Execution(format!("list failed: {}", e)))?;
        for entry in entries.filter_map(|e| e.ok()) {
            if files.len() >= MAX_RESULTS {
                truncated = true;
                break;
            }
            let path = entry.path();
            if path.is_file() && is_match(&path) {
                files.push(path);
            }
        }
    }
    if truncated {
        tracing::warn!(path = %root.display(), limit = MAX_RESULTS, "file search truncated");
    }
    files.sort();
    Ok(Matches {
        root,
        files,
        truncated,
    })
}

#[derive(Debug, Serialize)]
struct CountSummary {
    total: usize,
    path: String,
    pattern: String,
    sample_files: Vec<String>,
    /// 达到结果上限时为 true，此时 total 为下限
    truncated: bool,
}

/// 统计匹配文件数量，附带前若干个示例文件
pub struct CountFilesTool {
    sample_files: usize,
}

impl CountFilesTool {
    pub fn new(sample_files: usize) -> Self {
        Self { sample_files }
    }
}

impl Default for CountFilesTool {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Tool for CountFilesTool {
    fn description(&self) -> &str {
        "Count files matching a wildcard pattern under a directory. Args: {\"path\": \"directory, default '.'\", \"file_pattern\": \"e.g. '*.py', default '*'\", \"recursive\": false}. Returns {total, path, pattern, sample_files}."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<FileSearchArgs>()
    }

    async fn execute(&self, input: Map<String, Value>) -> Result<String, ToolError> {
        let args: FileSearchArgs = parse_args(input)?;
        tracing::info!(path = %args.path, pattern = %args.file_pattern, recursive = args.recursive, "count_files tool execute");
        let pattern = args.file_pattern.clone();
        let found = search(args).await?;
        let summary = CountSummary {
            total: found.files.len(),
            path: found.root.display().to_string(),
            pattern,
            sample_files: found
                .files
                .iter()
                .take(self.sample_files)
                .map(|p| p.display().to_string())
                .collect(),
            truncated: found.truncated,
        };
        serde_json::to_string(&summary).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

/// 列出匹配的文件名（按名称排序）
#[derive(Default)]
pub struct FindFilesTool;

#[async_trait]
impl Tool for FindFilesTool {
    fn description(&self) -> &str {
        "Find files matching a wildcard pattern under a directory. Args: {\"path\": \"directory, default '.'\", \"file_pattern\": \"e.g. '*.txt', default '*'\", \"recursive\": false}. Returns a list of {name}."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<FileSearchArgs>()
    }

    async fn execute(&self, input: Map<String, Value>) -> Result<String, ToolError> {
        let args: FileSearchArgs = parse_args(input)?;
        tracing::info!(path = %args.path, pattern = %args.file_pattern, recursive = args.recursive, "find_files tool execute");
        let found = search(args).await?;
        let mut names: Vec<String> = found
            .files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();
        names.sort();
        let listed: Vec<Value> = names
            .into_iter()
            .map(|name| serde_json::json!({ "name": name }))
            .collect();
        Ok(Value::Array(listed).to_string())
    }
}
