//! ReAct 状态机的阶段与单步转移

use serde::Serialize;
use serde_json::{Map, Value};

use crate::tools::ToolName;

/// Agent 阶段（事件与日志用）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Thinking,
    Deciding,
    Acting,
    Answered,
    Exhausted,
}

impl AgentPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentPhase::Answered | AgentPhase::Exhausted)
    }
}

/// 循环中下一步要执行的工作项，携带该阶段所需的数据
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Think,
    Decide { raw: String },
    Act { tool: ToolName, input: Map<String, Value> },
    Answered,
    Exhausted,
}

impl Step {
    pub fn phase(&self) -> AgentPhase {
        match self {
            Step::Think => AgentPhase::Thinking,
            Step::Decide { .. } => AgentPhase::Deciding,
            Step::Act { .. } => AgentPhase::Acting,
            Step::Answered => AgentPhase::Answered,
            Step::Exhausted => AgentPhase::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(Step::Answered.phase().is_terminal());
        assert!(Step::Exhausted.phase().is_terminal());
        assert!(!Step::Think.phase().is_terminal());
        assert_eq!(
            Step::Decide { raw: String::new() }.phase(),
            AgentPhase::Deciding
        );
    }
}
