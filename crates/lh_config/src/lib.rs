// crates/lh_config/src/lib.rs

//! LeafHydro Config Layer (Layer 4)
//!
//! 运行配置：网格尺寸、分块数量、暂存模式、分发策略与 halo 深度。
//! 配置以 JSON 存储，所有字段都有默认值。
//!
//! # 示例
//!
//! ```
//! use lh_config::RunConfig;
//!
//! let config = RunConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.halo_depth, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod run_config;

/// 层级标识
pub const LAYER: u8 = 4;

pub use error::ConfigError;
pub use run_config::{GridConfig, RunConfig, MAX_HALO_DEPTH};
