//! 可观测性：tracing 订阅者（控制台 + 可选日志文件）

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 日志文件名：`<agent_name>_<YYYY-mm-dd_HH-MM-SS>.log`
pub fn log_file_path(log_dir: &Path, agent_name: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!("{}_{}.log", agent_name, stamp))
}

/// 安装全局订阅者：默认 info，可通过 RUST_LOG 覆盖；给定 log_dir 时额外写入无 ANSI 的日志文件。
/// 返回日志文件路径（若有）。
pub fn init(agent_name: &str, log_dir: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, path) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = log_file_path(dir, agent_name);
            let file = Arc::new(File::create(&path)?);
            let layer = fmt::layer().with_ansi(false).with_writer(file);
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;
    Ok(path)
}
