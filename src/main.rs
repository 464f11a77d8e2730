//! Lab Agent - ReAct 演示入口
//!
//! 用法：`lab-agent [query...]`，未给出 query 时使用默认问题。

use anyhow::Context;
use lab_agent::config::{load_config, AppConfig};
use lab_agent::llm::create_llm_from_config;
use lab_agent::observability;
use lab_agent::tools::{CountFilesTool, FindFilesTool, ToolName};
use lab_agent::ReactAgent;

const DEFAULT_QUERY: &str = "How many python files are in the parent directory?";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(None).unwrap_or_else(|e| {
        eprintln!("failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    observability::init(&cfg.app.name, cfg.logging.log_dir.as_deref())
        .context("Failed to initialize logging")?;

    let llm = create_llm_from_config(&cfg);
    let mut agent = ReactAgent::from_config(&cfg, llm).context("Failed to create agent")?;
    agent.set_tool(ToolName::CountFiles, CountFilesTool::new(cfg.tools.sample_files));
    agent.set_tool(ToolName::FindFiles, FindFilesTool);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let query = if args.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        args.join(" ")
    };

    let answer = agent.execute(&query).await.context("Agent run failed")?;
    println!("{}", answer);
    Ok(())
}
