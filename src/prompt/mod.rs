//! Prompt 层：模板渲染与内置模板

pub mod builtin;
pub mod template;

pub use builtin::{chat_prompt, react_prompt};
pub use template::{substitute, vars, Example, PromptTemplate, PromptVars, TemplateError};
