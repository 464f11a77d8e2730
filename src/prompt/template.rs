//! Prompt 模板
//!
//! 占位符语法：`$name` 或 `${name}`，`$$` 表示字面量 `$`。
//! system prompt = prefix + examples + suffix（空段落贡献空串）；user prompt 为单一模板。
//! 模板声明的变量必须全部传入，缺失即报错。

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 渲染变量表
pub type PromptVars = HashMap<String, String>;

/// 由 (key, value) 列表构建变量表
pub fn vars<I, K, V>(pairs: I) -> PromptVars
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing template variable: {0}")]
    MissingVariable(String),

    #[error("invalid placeholder at byte {position}")]
    InvalidPlaceholder { position: usize },

    #[error("failed to read template {path}: {reason}")]
    Io { path: String, reason: String },
}

/// few-shot 示例
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, Default)]
pub struct PromptTemplate {
    pub prefix: String,
    pub examples: Vec<Example>,
    pub suffix: String,
    /// ReAct 思考步骤使用的 user 模板
    pub user: String,
}

impl PromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push(Example {
            input: input.into(),
            output: output.into(),
        });
        self
    }

    /// 从文件读取 user 模板
    pub fn user_from_file(mut self, path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        self.user = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self)
    }

    pub fn examples_section(&self) -> String {
        if self.examples.is_empty() {
            return String::new();
        }
        let mut s = String::from("\n\nExamples:\n");
        for (i, example) in self.examples.iter().enumerate() {
            s.push_str(&format!("Example {}:\n", i + 1));
            s.push_str(&format!("Input:\n{}\n", example.input));
            s.push_str(&format!("Output:\n{}\n\n", example.output));
        }
        s
    }

    /// prefix + examples + suffix
    pub fn render_system(&self, vars: &PromptVars) -> Result<String, TemplateError> {
        let prefix = substitute(&self.prefix, vars)?;
        let suffix = substitute(&self.suffix, vars)?;
        Ok(format!("{}{}{}", prefix, self.examples_section(), suffix))
    }

    pub fn render_user(&self, vars: &PromptVars) -> Result<String, TemplateError> {
        substitute(&self.user, vars)
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// 替换 `$name` / `${name}`；变量缺失返回 MissingVariable，`$` 后不是合法标识符返回 InvalidPlaceholder
pub fn substitute(template: &str, vars: &PromptVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let name = match chars.peek().copied() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
                continue;
            }
            Some((_, '{')) => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) if is_ident_char(ch) => name.push(ch),
                        _ => return Err(TemplateError::InvalidPlaceholder { position: pos }),
                    }
                }
                if !name.starts_with(is_ident_start) {
                    return Err(TemplateError::InvalidPlaceholder { position: pos });
                }
                name
            }
            Some((_, ch)) if is_ident_start(ch) => {
                let mut name = String::new();
                while let Some((_, ch)) = chars.peek().copied() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    name.push(ch);
                    chars.next();
                }
                name
            }
            _ => return Err(TemplateError::InvalidPlaceholder { position: pos }),
        };
        let value = vars
            .get(&name)
            .ok_or_else(|| TemplateError::MissingVariable(name.clone()))?;
        out.push_str(value);
    }

    Ok(out)
}
