//! 认知层：输出解码、过程事件、ReAct 主循环

pub mod decode;
pub mod events;
pub mod loop_;

pub use decode::{Decision, DecodeError, OutputDecoder};
pub use events::{EventSink, ReactEvent};
pub use loop_::{ReactAgent, ReactOutcome, RunStatus, DEFAULT_MAX_ITERATIONS, FINAL_ANSWER_MARKER};
