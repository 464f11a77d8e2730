//! 内置模板：ReAct 思考模板与简单对话模板

use crate::prompt::PromptTemplate;

/// ReAct user 模板变量：query / history / tools
const REACT_USER: &str = r#"
You are an advanced ReAct (Reasoning and Acting) agent designed to systematically analyze and respond to user queries through structured reasoning and strategic tool utilization.

Query: ${query}

Your mission is to thoroughly understand the query and execute the most effective approach to deliver accurate, comprehensive answers.

Previous reasoning steps and observations: ${history}

Available tools: ${tools}

Operational Guidelines:
1. Conduct deep analysis of the query, incorporating insights from previous reasoning steps and observations.
2. Make strategic decisions: either utilize an appropriate tool for information gathering or provide a definitive final answer.
3. Structure your response using the precise JSON format specified below:

When tool utilization is required:
{
    "thought": "Provide comprehensive reasoning about your analytical process and next strategic action",
    "action": {
        "name": "Specify the tool name exactly as given by tool_name in Available tools",
        "reason": "Articulate the strategic rationale behind your tool selection",
        "input": {
            "parameter_name1": "parameter1",
            "parameter_name2": "parameter2"
        }
    }
}

PS: input keys must match the tool's parameters schema.

When sufficient information is available for final response:
{
    "thought": "Present your complete analytical reasoning process",
    "answer": "Deliver a thorough, well-structured answer addressing all aspects of the query"
}

Critical Success Factors:
- Execute meticulous reasoning with clear logical progression.
- Deploy tools strategically when additional information is essential for accuracy.
- Ground all reasoning firmly in actual observations and verified data from tool outputs.
- When tools return null results or encounter failures, acknowledge these limitations transparently and pivot to alternative approaches.
- Provide final answers only when you possess high confidence in the completeness and accuracy of your information.
- If comprehensive information remains elusive despite exhaustive tool utilization, acknowledge the limitations and clearly state that insufficient reliable information is available for a confident response."#;

const CHAT_PREFIX: &str = "You are ${name}, a helpful assistant. Answer concisely and remember what the user told you earlier in this conversation.";

/// ReAct 模板：system 为空，思考 prompt 全部在 user 模板中
pub fn react_prompt() -> PromptTemplate {
    PromptTemplate::new().with_user(REACT_USER)
}

/// 简单对话模板：system 前缀需要 `name`
pub fn chat_prompt() -> PromptTemplate {
    PromptTemplate::new().with_prefix(CHAT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{vars, TemplateError};

    #[test]
    fn test_react_prompt_requires_all_variables() {
        let t = react_prompt();
        let err = t
            .render_user(&vars([("query", "q"), ("history", "")]))
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingVariable("tools".to_string()));

        let ok = t
            .render_user(&vars([("query", "count py"), ("history", "h"), ("tools", "[t]")]))
            .unwrap();
        assert!(ok.contains("Query: count py"));
        assert!(ok.contains("Available tools: [t]"));
        assert!(!ok.contains("wikipedia"));
    }

    #[test]
    fn test_chat_prompt_system() {
        let rendered = chat_prompt().render_system(&vars([("name", "puppy")])).unwrap();
        assert!(rendered.starts_with("You are puppy"));
    }
}
