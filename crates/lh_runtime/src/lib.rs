// crates/lh_runtime/src/lib.rs

//! LeafHydro Runtime Layer (Layer 2)
//!
//! 运行时抽象层，提供执行上下文、设备缓冲区与区间分发。
//!
//! # 模块概览
//!
//! - [`scalar`]: DeviceScalar trait（密封，逐元素原子存储）
//! - [`context`]: Context 执行上下文（设备 + 有序队列）
//! - [`buffer`]: Buffer1D / Buffer2D 设备缓冲区及视图
//! - [`range`]: Range1d / Range2d 半开索引区间
//! - [`dispatch`]: 阻塞/延迟区间分发与三种二维布局策略
//! - [`error`]: 运行时错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: lh_cli      ─> run / info / validate
//! Layer 4: lh_config   ─> RunConfig
//! Layer 3: lh_physics  ─> Chunk, Tile, ExchangeCoordinator
//! Layer 2: lh_runtime  ─> Context, Buffer1D/2D, par_ranged (本层)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod range;
pub mod scalar;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出核心类型
pub use buffer::{Buffer1D, Buffer2D, BufferMirror2D, View1D, View2D};
pub use context::{Context, ContextBound, ContextConfig};
pub use dispatch::{Queue, Range2dMode, ROUND_BLOCK};
pub use error::{RuntimeError, RuntimeResult};
pub use range::{Range1d, Range2d};
pub use scalar::DeviceScalar;

/// 预导入模块
pub mod prelude {
    pub use crate::buffer::{Buffer1D, Buffer2D, View1D, View2D};
    pub use crate::context::{Context, ContextConfig};
    pub use crate::dispatch::{Queue, Range2dMode};
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::range::{Range1d, Range2d};
    pub use crate::scalar::DeviceScalar;
}
