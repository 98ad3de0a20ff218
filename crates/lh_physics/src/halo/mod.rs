// crates/lh_physics/src/halo/mod.rs

//! halo 更新
//!
//! - [`pack`]: tile 边缘条带与一维交换缓冲区之间的复制
//! - [`tile`]: chunk 内 tile 之间的直接复制
//! - [`exchange`]: chunk 间两阶段交换协调器
//! - [`verify`]: 基于解析场的 halo 正确性检查

pub mod exchange;
pub mod pack;
pub mod tile;
pub mod verify;

pub use exchange::{ExchangeCoordinator, ExchangeReport, ExchangeStage, FaceBuffers};
pub use pack::{pack_tile, unpack_tile, HaloOffsets, Transfer};
pub use tile::update_tile_halo;
pub use verify::{verify_halo, HaloCheck, HaloMismatch};
