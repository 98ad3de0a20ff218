// crates/lh_config/src/run_config.rs

//! 运行配置
//!
//! 从 JSON 文件加载，缺省字段取默认值，加载后立即校验。

use std::path::Path;

use lh_runtime::{ContextConfig, Range2dMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// 支持的最大 halo 深度（场数组两侧各有两层 ghost）
pub const MAX_HALO_DEPTH: usize = 2;

/// 全局网格配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// X 方向单元数
    #[serde(default = "default_cells")]
    pub x_cells: usize,

    /// Y 方向单元数
    #[serde(default = "default_cells")]
    pub y_cells: usize,

    /// 最小 X 坐标
    #[serde(default)]
    pub xmin: f64,

    /// 最大 X 坐标
    #[serde(default = "default_extent")]
    pub xmax: f64,

    /// 最小 Y 坐标
    #[serde(default)]
    pub ymin: f64,

    /// 最大 Y 坐标
    #[serde(default = "default_extent")]
    pub ymax: f64,
}

fn default_cells() -> usize { 10 }
fn default_extent() -> f64 { 10.0 }

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            x_cells: default_cells(),
            y_cells: default_cells(),
            xmin: 0.0,
            xmax: default_extent(),
            ymin: 0.0,
            ymax: default_extent(),
        }
    }
}

impl GridConfig {
    /// X 方向单元宽度
    pub fn dx(&self) -> f64 {
        (self.xmax - self.xmin) / self.x_cells as f64
    }

    /// Y 方向单元宽度
    pub fn dy(&self) -> f64 {
        (self.ymax - self.ymin) / self.y_cells as f64
    }
}

/// 运行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// 全局网格
    #[serde(default)]
    pub grid: GridConfig,

    /// 每个 chunk 的 tile 数
    #[serde(default = "default_tiles_per_chunk")]
    pub tiles_per_chunk: usize,

    /// 通信前经主机内存暂存
    #[serde(default)]
    pub staging_buffer: bool,

    /// 二维分发布局策略
    #[serde(default)]
    pub range2d_mode: Range2dMode,

    /// 延迟作用域内逐个阻塞
    #[serde(default = "default_sync_kernels")]
    pub sync_kernels: bool,

    /// 每个 rank 的工作线程数
    #[serde(default)]
    pub threads: Option<usize>,

    /// 每个上下文的设备内存上限（字节）
    #[serde(default)]
    pub memory_limit_bytes: Option<usize>,

    /// halo 交换深度
    #[serde(default = "default_halo_depth")]
    pub halo_depth: usize,
}

fn default_tiles_per_chunk() -> usize { 1 }
fn default_sync_kernels() -> bool { true }
fn default_halo_depth() -> usize { 2 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            tiles_per_chunk: default_tiles_per_chunk(),
            staging_buffer: false,
            range2d_mode: Range2dMode::default(),
            sync_kernels: default_sync_kernels(),
            threads: None,
            memory_limit_bytes: None,
            halo_depth: default_halo_depth(),
        }
    }
}

impl RunConfig {
    /// 从文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let config: RunConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        debug!(path = %path.as_ref().display(), "加载运行配置");
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = &self.grid;
        if grid.x_cells == 0 {
            return Err(ConfigError::invalid("grid.x_cells", grid.x_cells, "单元数必须为正"));
        }
        if grid.y_cells == 0 {
            return Err(ConfigError::invalid("grid.y_cells", grid.y_cells, "单元数必须为正"));
        }
        if !(grid.xmax > grid.xmin) {
            return Err(ConfigError::invalid(
                "grid.xmax",
                grid.xmax,
                "必须大于 grid.xmin",
            ));
        }
        if !(grid.ymax > grid.ymin) {
            return Err(ConfigError::invalid(
                "grid.ymax",
                grid.ymax,
                "必须大于 grid.ymin",
            ));
        }

        if self.tiles_per_chunk == 0 {
            return Err(ConfigError::invalid(
                "tiles_per_chunk",
                self.tiles_per_chunk,
                "至少需要一个 tile",
            ));
        }

        if !(1..=MAX_HALO_DEPTH).contains(&self.halo_depth) {
            return Err(ConfigError::invalid(
                "halo_depth",
                self.halo_depth,
                "必须在 1..=2 范围内",
            ));
        }

        if self.threads == Some(0) {
            return Err(ConfigError::invalid("threads", 0, "线程数必须为正"));
        }

        Ok(())
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 派生执行上下文配置
    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            threads: self.threads,
            range2d_mode: self.range2d_mode,
            sync_kernels: self.sync_kernels,
            memory_limit_bytes: self.memory_limit_bytes,
        }
    }
}
