//! 核心类型：错误、状态机阶段

pub mod error;
pub mod state;

pub use error::AgentError;
pub use state::{AgentPhase, Step};
