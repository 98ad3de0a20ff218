// crates/lh_physics/src/kernels/field_summary.rs

//! 守恒量汇总
//!
//! 在每个 tile 的内部单元上归约体积、质量、内能、动能与压力体积积，
//! 再经传输层对所有 rank 求和。动能使用单元四个顶点速度平方的平均。

use std::fmt;

use lh_runtime::{Context, Range2d};
use serde::Serialize;

use crate::comms::Transport;
use crate::error::HydroResult;
use crate::fields::GHOST_LAYERS;
use crate::mesh::Chunk;

/// 全局守恒量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldSummary {
    /// 总体积
    pub volume: f64,
    /// 总质量
    pub mass: f64,
    /// 总内能
    pub internal_energy: f64,
    /// 总动能
    pub kinetic_energy: f64,
    /// 压力体积积
    pub pressure: f64,
}

impl FieldSummary {
    /// 总能量
    pub fn total_energy(&self) -> f64 {
        self.internal_energy + self.kinetic_energy
    }
}

impl fmt::Display for FieldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vol={:.6e} mass={:.6e} ie={:.6e} ke={:.6e} press={:.6e}",
            self.volume, self.mass, self.internal_energy, self.kinetic_energy, self.pressure
        )
    }
}

fn add(a: [f64; 5], b: [f64; 5]) -> [f64; 5] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3], a[4] + b[4]]
}

/// 本 chunk 的局部汇总
pub fn local_summary(context: &Context, chunk: &Chunk) -> FieldSummary {
    let mut totals = [0.0; 5];
    for tile in &chunk.tiles {
        let field = &tile.field;
        let (volume, density0, energy0, pressure) = (
            field.volume.view(),
            field.density0.view(),
            field.energy0.view(),
            field.pressure.view(),
        );
        let (xvel0, yvel0) = (field.xvel0.view(), field.yvel0.view());

        let interior = Range2d::new(
            GHOST_LAYERS,
            GHOST_LAYERS,
            tile.info.t_xmax + GHOST_LAYERS,
            tile.info.t_ymax + GHOST_LAYERS,
        );
        let tile_totals = context.par_reduce2(
            interior,
            [0.0; 5],
            move |j, k| {
                let mut vsqrd = 0.0;
                for kv in k..=k + 1 {
                    for jv in j..=j + 1 {
                        let (u, v) = (xvel0.get(jv, kv), yvel0.get(jv, kv));
                        vsqrd += 0.25 * (u * u + v * v);
                    }
                }
                let cell_vol = volume.get(j, k);
                let cell_mass = cell_vol * density0.get(j, k);
                [
                    cell_vol,
                    cell_mass,
                    cell_mass * energy0.get(j, k),
                    cell_mass * 0.5 * vsqrd,
                    cell_vol * pressure.get(j, k),
                ]
            },
            add,
        );
        totals = add(totals, tile_totals);
    }

    FieldSummary {
        volume: totals[0],
        mass: totals[1],
        internal_energy: totals[2],
        kinetic_energy: totals[3],
        pressure: totals[4],
    }
}

/// 全局汇总（所有 rank 得到相同结果）
pub fn field_summary<T: Transport + ?Sized>(
    context: &Context,
    chunk: &Chunk,
    transport: &T,
) -> HydroResult<FieldSummary> {
    let local = local_summary(context, chunk);
    Ok(FieldSummary {
        volume: transport.all_reduce_sum(local.volume)?,
        mass: transport.all_reduce_sum(local.mass)?,
        internal_energy: transport.all_reduce_sum(local.internal_energy)?,
        kinetic_energy: transport.all_reduce_sum(local.kinetic_energy)?,
        pressure: transport.all_reduce_sum(local.pressure)?,
    })
}
