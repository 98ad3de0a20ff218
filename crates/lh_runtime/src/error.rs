// crates/lh_runtime/src/error.rs

//! 运行时错误类型
//!
//! 定义 Runtime 层的错误类型：设备内存分配、上下文归属、尺寸校验、
//! 内核执行以及线程池构建失败。

use thiserror::Error;

/// 运行时错误
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// 设备内存分配失败
    #[error("设备内存分配失败: {label} 请求 {elements} 个元素 ({bytes} 字节): {reason}")]
    Allocation {
        /// 缓冲区类别
        label: &'static str,
        /// 元素数量
        elements: usize,
        /// 字节数
        bytes: usize,
        /// 原因
        reason: String,
    },

    /// 缓冲区不属于当前上下文
    #[error("上下文不匹配: 缓冲区属于上下文 #{owner}, 当前上下文 #{current}")]
    ContextMismatch {
        /// 缓冲区所属上下文
        owner: u64,
        /// 当前上下文
        current: u64,
    },

    /// 缓冲区大小不匹配
    #[error("缓冲区大小不匹配: 期望 {expected}, 实际 {actual}")]
    SizeMismatch {
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 内核执行失败
    #[error("内核执行失败: {message}")]
    Kernel {
        /// 失败描述
        message: String,
    },

    /// 同步点处仍有未完成的延迟分发
    #[error("队列存在 {pending} 个未完成的延迟作用域")]
    PendingWork {
        /// 未完成作用域数量
        pending: usize,
    },

    /// 线程池构建失败
    #[error("线程池构建失败: {message}")]
    ThreadPool {
        /// 失败描述
        message: String,
    },
}

impl RuntimeError {
    /// 是否为资源类错误（内存或线程池）
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Allocation { .. } | Self::ThreadPool { .. })
    }
}

/// 运行时结果类型
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::SizeMismatch { expected: 10, actual: 4 };
        assert!(err.to_string().contains("期望 10"));

        let err = RuntimeError::Allocation {
            label: "Buffer2D",
            elements: 16,
            bytes: 128,
            reason: "超出内存上限".into(),
        };
        assert!(err.is_resource());
        assert!(err.to_string().contains("Buffer2D"));
    }
}
