//! 模型输出解码：将半结构化文本解析为 Action 或 Answer
//!
//! 与状态机隔离：Strict 只接受合法 JSON；Lenient 先剥离 Markdown 代码块与前后说明文字，
//! 解析失败再做一次修复（单引号、尾逗号、Python 字面量、未加引号的键与值、未闭合的括号/字符串）。

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{CaseFold, ParseMode};

/// 解析结果：要么调用工具，要么给出最终回答
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Action {
        /// 缺失时视为工具不存在
        name: Option<String>,
        reason: Option<String>,
        input: Map<String, Value>,
    },
    Answer(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("output is not valid json: {0}")]
    Syntax(String),

    #[error("unexpected output shape: {0}")]
    UnexpectedShape(String),

    #[error("output has neither 'action' nor 'answer'")]
    MissingFields,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputDecoder {
    pub mode: ParseMode,
    pub case_fold: CaseFold,
}

impl OutputDecoder {
    pub fn new(mode: ParseMode, case_fold: CaseFold) -> Self {
        Self { mode, case_fold }
    }

    pub fn decode(&self, raw: &str) -> Result<Decision, DecodeError> {
        let text = match self.case_fold {
            CaseFold::Full => raw.to_lowercase(),
            CaseFold::Identifiers => raw.to_string(),
        };
        let mut value = match self.mode {
            ParseMode::Strict => serde_json::from_str::<Value>(text.trim())
                .map_err(|e| DecodeError::Syntax(e.to_string()))?,
            ParseMode::Lenient => parse_lenient(&text)?,
        };
        if self.case_fold == CaseFold::Identifiers {
            lowercase_keys(&mut value);
        }
        interpret(value)
    }
}

fn parse_lenient(text: &str) -> Result<Value, DecodeError> {
    let candidate = extract_json(text);
    match serde_json::from_str::<Value>(candidate) {
        Ok(v) => Ok(v),
        Err(first) => serde_json::from_str::<Value>(&repair_json(candidate))
            .map_err(|_| DecodeError::Syntax(first.to_string())),
    }
}

/// 将解析出的值映射为 Decision；列表输出取第二个元素
fn interpret(value: Value) -> Result<Decision, DecodeError> {
    let value = match value {
        Value::Array(mut items) => {
            if items.len() < 2 {
                return Err(DecodeError::UnexpectedShape(format!(
                    "list output with {} element(s), expected the object at index 1",
                    items.len()
                )));
            }
            items.swap_remove(1)
        }
        other => other,
    };
    let mut obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(DecodeError::UnexpectedShape(format!(
                "expected a json object, got {}",
                kind_of(&other)
            )))
        }
    };

    if obj.get("action").is_some_and(is_truthy) {
        let Some(Value::Object(mut action)) = obj.remove("action") else {
            return Err(DecodeError::UnexpectedShape(
                "'action' must be an object".to_string(),
            ));
        };
        let name = action
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let reason = action
            .get("reason")
            .and_then(Value::as_str)
            .map(String::from);
        let input = match action.remove("input") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m,
            Some(other) => {
                return Err(DecodeError::UnexpectedShape(format!(
                    "'action.input' must be an object, got {}",
                    kind_of(&other)
                )))
            }
        };
        return Ok(Decision::Action {
            name,
            reason,
            input,
        });
    }

    if let Some(answer) = obj.remove("answer").filter(is_truthy) {
        let text = match answer {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Ok(Decision::Answer(text));
    }

    Err(DecodeError::MissingFields)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lowercase_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let taken = std::mem::take(map);
            for (k, mut v) in taken {
                lowercase_keys(&mut v);
                map.insert(k.to_lowercase(), v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(lowercase_keys),
        _ => {}
    }
}

/// 取出最可能是 JSON 的片段：优先 ``` 代码块，其次第一个 `{`/`[` 到最后一个 `}`/`]`
pub fn extract_json(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(start) = s.find("```") {
        let rest = &s[start + 3..];
        // 跳过紧跟在 ``` 后的语言标记（```json），标记后可以直接接正文
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        let rest = &rest[tag_len..];
        s = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest).trim();
    }
    let Some(start) = s.find(['{', '[']) else {
        return s;
    };
    match s.rfind(['}', ']']) {
        Some(end) if end > start => &s[start..=end],
        _ => &s[start..],
    }
}

/// 尽力修复近似 JSON；结果不保证合法，由调用方再次解析
pub fn repair_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let (literal, next) = read_string(&chars, i);
                out.push_str(&literal);
                i = next;
                continue;
            }
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                trim_trailing_comma(&mut out);
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, None | Some('}') | Some(']')) {
                    i += 1;
                    continue;
                }
            }
            c if c == '-' || c.is_ascii_digit() => {
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '-' | '+' | '.' | 'e' | 'E'))
                {
                    out.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            c if is_bare_start(c) => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || is_bare_start(chars[i]) || chars[i] == '-')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" | "false" | "null" => out.push_str(&word),
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" | "none" => out.push_str("null"),
                    _ => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                }
                continue;
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }

    trim_trailing_comma(&mut out);
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// 未加引号的键或值（如 `name: count_files`、`path: ./src`）可以由这些字符开头
fn is_bare_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '.' | '/' | '~' | '*' | '?')
}

/// 读取一个以 `"` 或 `'` 开头的字符串，统一输出为双引号字符串；未闭合时自动补齐
fn read_string(chars: &[char], start: usize) -> (String, usize) {
    let quote = chars[start];
    let mut out = String::from('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let escaped = chars[i + 1];
            if quote == '\'' && escaped == '\'' {
                out.push('\'');
            } else {
                out.push('\\');
                out.push(escaped);
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return (out, i + 1);
        }
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }
    out.push('"');
    (out, i)
}

fn trim_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}
