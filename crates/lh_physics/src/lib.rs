// crates/lh_physics/src/lib.rs

//! LeafHydro Physics Layer (Layer 3)
//!
//! 结构网格分解与 halo 交换核心。
//!
//! # 模块概览
//!
//! - [`mesh`]: 全局网格到 chunk/tile 的分解，Chunk 与 Tile 对象
//! - [`fields`]: 可交换场标识、场选择与每个 tile 的场数组
//! - [`halo`]: 打包/解包、tile 间复制、chunk 间交换协调器与正确性检查
//! - [`comms`]: rank 间传输（进程内线程 / MPI）
//! - [`kernels`]: 几何初始化、守恒量汇总、动量输运
//! - [`state`]: 一个 rank 的模拟状态
//! - [`dump`]: 文本调试快照
//!
//! # 示例
//!
//! ```
//! use lh_config::{GridConfig, RunConfig};
//! use lh_physics::prelude::*;
//! use lh_runtime::{Context, ContextConfig};
//!
//! let config = RunConfig {
//!     grid: GridConfig { x_cells: 8, y_cells: 8, ..Default::default() },
//!     tiles_per_chunk: 4,
//!     ..Default::default()
//! };
//! let context = Context::new(ContextConfig::default().with_threads(2)).unwrap();
//! let mut state = SimulationState::build(config, context, 0, 1).unwrap();
//!
//! let universe = local_universe(1);
//! let selection = FieldSelection::of(&[FieldId::Density0, FieldId::XVel0]);
//! state.update_halo(&universe[0], &selection, 2).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comms;
pub mod dump;
pub mod error;
pub mod fields;
pub mod halo;
pub mod kernels;
pub mod mesh;
pub mod state;

/// 层级标识
pub const LAYER: u8 = 3;

// 重导出核心类型
pub use comms::{local_universe, HaloMessage, LocalTransport, Transport};
#[cfg(feature = "distributed")]
pub use comms::MpiTransport;
pub use dump::{dump, DumpOptions};
pub use error::{HydroError, HydroResult};
pub use fields::{FieldId, FieldKind, FieldSelection, FieldSet, GHOST_LAYERS, NUM_FIELDS};
pub use halo::{update_tile_halo, verify_halo, ExchangeCoordinator, ExchangeReport, HaloCheck};
pub use kernels::FieldSummary;
pub use mesh::{Chunk, ChunkLayout, ChunkNeighbour, Decomposition, Face, Tile, TileInfo, TileNeighbour};
pub use state::{RunState, SimulationState};

/// 预导入模块
pub mod prelude {
    pub use crate::comms::{local_universe, LocalTransport, Transport};
    pub use crate::error::{HydroError, HydroResult};
    pub use crate::fields::{FieldId, FieldSelection};
    pub use crate::halo::{verify_halo, ExchangeReport};
    pub use crate::mesh::{Chunk, Decomposition, Face};
    pub use crate::state::SimulationState;
}
