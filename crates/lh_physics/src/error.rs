// crates/lh_physics/src/error.rs

//! 物理层错误类型
//!
//! 所有错误对运行都是致命的：调用方记录错误所在阶段后终止整个进程组。

use std::path::PathBuf;

use lh_config::ConfigError;
use lh_runtime::RuntimeError;
use thiserror::Error;

/// 物理层错误
#[derive(Debug, Error)]
pub enum HydroError {
    /// 网格无法按要求分解
    #[error("分解错误: {message}")]
    Configuration {
        /// 错误描述
        message: String,
    },

    /// 运行时资源或内核错误
    #[error("资源错误: {0}")]
    Resource(#[from] RuntimeError),

    /// 消息传输失败
    #[error("通信错误 [{stage}] (对端 {peer:?}): {message}")]
    Communication {
        /// 所在阶段（轴或操作）
        stage: String,
        /// 对端 rank
        peer: Option<usize>,
        /// 错误描述
        message: String,
    },

    /// halo 深度超出支持范围
    #[error("无效的 halo 深度: {depth} (支持 1..={max})")]
    InvalidHaloDepth {
        /// 请求深度
        depth: usize,
        /// 最大深度
        max: usize,
    },

    /// 交换缓冲区容量不足
    #[error("halo 缓冲区容量不足 ({axis}): 需要 {required}, 容量 {capacity}")]
    HaloCapacity {
        /// 轴
        axis: &'static str,
        /// 所需元素数
        required: usize,
        /// 容量
        capacity: usize,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 文件 IO 错误
    #[error("IO 错误 {path}: {source}")]
    Io {
        /// 文件路径
        path: PathBuf,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },
}

impl HydroError {
    /// 构造分解错误
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// 构造通信错误
    pub fn communication(stage: impl Into<String>, peer: Option<usize>, message: impl Into<String>) -> Self {
        Self::Communication { stage: stage.into(), peer, message: message.into() }
    }

    /// 为通信错误补充阶段信息
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            Self::Communication { stage: inner, peer, message } => Self::Communication {
                stage: format!("{}/{}", stage, inner),
                peer,
                message,
            },
            other => other,
        }
    }

    /// 错误所属阶段（用于终止前的日志）
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration { .. } | Self::Config(_) => "setup",
            Self::Resource(_) => "device",
            Self::Communication { .. } => "communication",
            Self::InvalidHaloDepth { .. } | Self::HaloCapacity { .. } => "halo",
            Self::Io { .. } => "io",
        }
    }
}

/// 物理层结果类型
pub type HydroResult<T> = Result<T, HydroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(HydroError::configuration("x").stage(), "setup");
        let err = HydroError::communication("recv", Some(3), "断开").in_stage("left/right");
        assert_eq!(err.stage(), "communication");
        let text = err.to_string();
        assert!(text.contains("left/right/recv"));
        assert!(text.contains("Some(3)"));
    }

    #[test]
    fn test_runtime_error_converts() {
        let err: HydroError = RuntimeError::Kernel { message: "boom".into() }.into();
        assert_eq!(err.stage(), "device");
    }
}
