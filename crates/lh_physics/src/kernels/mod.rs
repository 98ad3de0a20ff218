// crates/lh_physics/src/kernels/mod.rs

//! 网格内核
//!
//! - [`initialise_chunk`]: 网格几何（坐标、间距、体积、面积）
//! - [`field_summary`]: 全局守恒量汇总
//! - [`advec_mom`]: 动量输运

pub mod advec_mom;
pub mod field_summary;
pub mod initialise_chunk;

pub use advec_mom::{advec_mom, advec_mom_kernel, Direction, Sweep, Velocity};
pub use field_summary::{field_summary, FieldSummary};
pub use initialise_chunk::initialise_chunk;
