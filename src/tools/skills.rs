//! 技能桩：fire / ice（演示用的固定输出工具）

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::tools::{parse_args, schema_of, Tool, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SkillArgs {
    /// 技能名称
    pub skill: String,
}

pub struct FireSkillTool;

#[async_trait]
impl Tool for FireSkillTool {
    fn description(&self) -> &str {
        "Fire skill description: fire magic damage. Args: {\"skill\": \"skill name\"}"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SkillArgs>()
    }

    async fn execute(&self, input: Map<String, Value>) -> Result<String, ToolError> {
        let _args: SkillArgs = parse_args(input)?;
        Ok("fire magic damage 3000, effective against ice-type agents".to_string())
    }
}

pub struct IceSkillTool;

#[async_trait]
impl Tool for IceSkillTool {
    fn description(&self) -> &str {
        "Ice skill description: ice magic damage. Args: {\"skill\": \"skill name\"}"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SkillArgs>()
    }

    async fn execute(&self, input: Map<String, Value>) -> Result<String, ToolError> {
        let _args: SkillArgs = parse_args(input)?;
        Ok("ice magic damage 23456, effective against grass-type agents".to_string())
    }
}
