// apps/lh_cli/src/commands/mod.rs

//! 子命令

pub mod info;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use lh_config::RunConfig;

/// 从文件加载配置，未给出时使用默认配置
pub fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}
