pub mod local_search;
pub mod registry;
pub mod skills;

pub use local_search::{CountFilesTool, FileSearchArgs, FindFilesTool};
pub use registry::{parse_args, schema_of, Tool, ToolError, ToolName, ToolRegistry};
pub use skills::{FireSkillTool, IceSkillTool};
