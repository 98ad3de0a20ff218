// crates/lh_physics/src/kernels/advec_mom.rs

//! 动量输运
//!
//! 顶点动量的二阶输运重映射，采用 van Leer 限制器与方向分裂。
//!
//! 工作数组约定：
//!
//! | 数组 | 用途 |
//! |------|------|
//! | work_array1 | node_flux |
//! | work_array2 | node_mass_post |
//! | work_array3 | node_mass_pre |
//! | work_array4 | mom_flux |
//! | work_array5 | pre_vol |
//! | work_array6 | post_vol |
//!
//! `pre_vol` 只被写入、不参与更新，保留以与其它输运内核的工作数组布局一致。
//! 节点通量与节点质量只在第一个速度分量的调用中计算，第二个分量复用。

use lh_runtime::{Context, Range2d};
use tracing::trace;

use crate::error::HydroResult;
use crate::fields::FieldSet;
use crate::mesh::{Chunk, TileInfo};

/// 输运方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// X 方向
    X = 1,
    /// Y 方向
    Y = 2,
}

/// 被输运的速度分量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Velocity {
    /// xvel1（先调用，负责计算节点通量与质量）
    X,
    /// yvel1
    Y,
}

/// 分裂扫描序号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// 第一次扫描
    First = 1,
    /// 第二次扫描
    Second = 2,
}

/// 对单个 tile 执行动量输运
pub fn advec_mom_kernel(
    context: &Context,
    info: &TileInfo,
    field: &FieldSet,
    velocity: Velocity,
    sweep: Sweep,
    direction: Direction,
) {
    let (x_min, x_max, y_min, y_max) = (info.t_xmin, info.t_xmax, info.t_ymin, info.t_ymax);

    let vel1 = match velocity {
        Velocity::X => field.xvel1.view(),
        Velocity::Y => field.yvel1.view(),
    };
    let mass_flux_x = field.mass_flux_x.view();
    let vol_flux_x = field.vol_flux_x.view();
    let mass_flux_y = field.mass_flux_y.view();
    let vol_flux_y = field.vol_flux_y.view();
    let volume = field.volume.view();
    let density1 = field.density1.view();
    let node_flux = field.work_array1.view();
    let node_mass_post = field.work_array2.view();
    let node_mass_pre = field.work_array3.view();
    let mom_flux = field.work_array4.view();
    let pre_vol = field.work_array5.view();
    let post_vol = field.work_array6.view();
    let celldx = field.celldx.view();
    let celldy = field.celldy.view();

    let mom_sweep = direction as usize + 2 * (sweep as usize - 1);
    let full = Range2d::new(x_min - 1, y_min - 1, x_max + 4, y_max + 4);

    match mom_sweep {
        1 => context.par_ranged2(full, move |i, j| {
            let post = volume.get(i, j) + vol_flux_y.get(i, j + 1) - vol_flux_y.get(i, j);
            post_vol.set(i, j, post);
            pre_vol.set(i, j, post + vol_flux_x.get(i + 1, j) - vol_flux_x.get(i, j));
        }),
        2 => context.par_ranged2(full, move |i, j| {
            let post = volume.get(i, j) + vol_flux_x.get(i + 1, j) - vol_flux_x.get(i, j);
            post_vol.set(i, j, post);
            pre_vol.set(i, j, post + vol_flux_y.get(i, j + 1) - vol_flux_y.get(i, j));
        }),
        3 => context.par_ranged2(full, move |i, j| {
            let post = volume.get(i, j);
            post_vol.set(i, j, post);
            pre_vol.set(i, j, post + vol_flux_y.get(i, j + 1) - vol_flux_y.get(i, j));
        }),
        _ => context.par_ranged2(full, move |i, j| {
            let post = volume.get(i, j);
            post_vol.set(i, j, post);
            pre_vol.set(i, j, post + vol_flux_x.get(i + 1, j) - vol_flux_x.get(i, j));
        }),
    }

    let node_mass = move |i: usize, j: usize| {
        0.25 * (density1.get(i, j - 1) * post_vol.get(i, j - 1)
            + density1.get(i, j) * post_vol.get(i, j)
            + density1.get(i - 1, j - 1) * post_vol.get(i - 1, j - 1)
            + density1.get(i - 1, j) * post_vol.get(i - 1, j))
    };

    match direction {
        Direction::X => {
            if velocity == Velocity::X {
                context.par_ranged2(Range2d::new(x_min - 1, y_min + 1, x_max + 4, y_max + 3), move |i, j| {
                    node_flux.set(
                        i,
                        j,
                        0.25 * (mass_flux_x.get(i, j - 1)
                            + mass_flux_x.get(i, j)
                            + mass_flux_x.get(i + 1, j - 1)
                            + mass_flux_x.get(i + 1, j)),
                    );
                });
                context.par_ranged2(Range2d::new(x_min, y_min + 1, x_max + 4, y_max + 3), move |i, j| {
                    let post = node_mass(i, j);
                    node_mass_post.set(i, j, post);
                    node_mass_pre.set(i, j, post - node_flux.get(i - 1, j) + node_flux.get(i, j));
                });
            }

            context.par_ranged2(Range2d::new(x_min, y_min + 1, x_max + 3, y_max + 3), move |i, j| {
                let flux = node_flux.get(i, j);
                let (upwind, donor, downwind, dif) =
                    if flux < 0.0 { (i + 2, i + 1, i, i + 1) } else { (i - 1, i, i + 1, i - 1) };
                let sigma = flux.abs() / node_mass_pre.get(donor, j);
                let limited = limited_velocity(
                    sigma,
                    celldx.get(i),
                    celldx.get(dif),
                    vel1.get(upwind, j),
                    vel1.get(donor, j),
                    vel1.get(downwind, j),
                );
                mom_flux.set(i, j, limited * flux);
            });

            context.par_ranged2(Range2d::new(x_min + 1, y_min + 1, x_max + 3, y_max + 3), move |i, j| {
                let updated = (vel1.get(i, j) * node_mass_pre.get(i, j) + mom_flux.get(i - 1, j)
                    - mom_flux.get(i, j))
                    / node_mass_post.get(i, j);
                vel1.set(i, j, updated);
            });
        }
        Direction::Y => {
            if velocity == Velocity::X {
                context.par_ranged2(Range2d::new(x_min + 1, y_min - 1, x_max + 3, y_max + 4), move |i, j| {
                    node_flux.set(
                        i,
                        j,
                        0.25 * (mass_flux_y.get(i - 1, j)
                            + mass_flux_y.get(i, j)
                            + mass_flux_y.get(i - 1, j + 1)
                            + mass_flux_y.get(i, j + 1)),
                    );
                });
                context.par_ranged2(Range2d::new(x_min + 1, y_min, x_max + 3, y_max + 4), move |i, j| {
                    let post = node_mass(i, j);
                    node_mass_post.set(i, j, post);
                    node_mass_pre.set(i, j, post - node_flux.get(i, j - 1) + node_flux.get(i, j));
                });
            }

            context.par_ranged2(Range2d::new(x_min + 1, y_min, x_max + 3, y_max + 3), move |i, j| {
                let flux = node_flux.get(i, j);
                let (upwind, donor, downwind, dif) =
                    if flux < 0.0 { (j + 2, j + 1, j, j + 1) } else { (j - 1, j, j + 1, j - 1) };
                let sigma = flux.abs() / node_mass_pre.get(i, donor);
                let limited = limited_velocity(
                    sigma,
                    celldy.get(j),
                    celldy.get(dif),
                    vel1.get(i, upwind),
                    vel1.get(i, donor),
                    vel1.get(i, downwind),
                );
                mom_flux.set(i, j, limited * flux);
            });

            context.par_ranged2(Range2d::new(x_min + 1, y_min + 1, x_max + 3, y_max + 3), move |i, j| {
                let updated = (vel1.get(i, j) * node_mass_pre.get(i, j) + mom_flux.get(i, j - 1)
                    - mom_flux.get(i, j))
                    / node_mass_post.get(i, j);
                vel1.set(i, j, updated);
            });
        }
    }
}

/// van Leer 限制后的输运速度
#[inline]
fn limited_velocity(sigma: f64, width: f64, dif_width: f64, upwind: f64, donor: f64, downwind: f64) -> f64 {
    let vdiffuw = donor - upwind;
    let vdiffdw = downwind - donor;
    let mut limiter = 0.0;
    if vdiffuw * vdiffdw > 0.0 {
        let auw = vdiffuw.abs();
        let adw = vdiffdw.abs();
        let wind = if vdiffdw <= 0.0 { -1.0 } else { 1.0 };
        limiter = wind
            * (width * ((2.0 - sigma) * adw / width + (1.0 + sigma) * auw / dif_width) / 6.0)
                .min(auw)
                .min(adw);
    }
    donor + (1.0 - sigma) * limiter
}

/// 对 chunk 内所有 tile 执行动量输运
pub fn advec_mom(
    context: &Context,
    chunk: &Chunk,
    velocity: Velocity,
    direction: Direction,
    sweep: Sweep,
) -> HydroResult<()> {
    for tile in &chunk.tiles {
        context.ensure_owned(&tile.field.xvel1)?;
        advec_mom_kernel(context, &tile.info, &tile.field, velocity, sweep, direction);
    }
    trace!(?velocity, ?direction, ?sweep, "动量输运完成");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldId;
    use crate::kernels::initialise_chunk;
    use crate::mesh::Decomposition;
    use lh_config::GridConfig;
    use lh_runtime::ContextConfig;

    fn setup(ctx: &Context) -> Chunk {
        let grid = GridConfig { x_cells: 6, y_cells: 5, ..Default::default() };
        let d = Decomposition::new(grid.x_cells, grid.y_cells, 1, 1).unwrap();
        let chunk = Chunk::allocate(ctx, d.chunk(0).unwrap().clone(), d.tiles(0).unwrap()).unwrap();
        initialise_chunk(ctx, &chunk, &grid).unwrap();
        chunk.fill(FieldId::Density1, 1.0);
        chunk
    }

    #[test]
    fn test_zero_flux_preserves_velocity() {
        let ctx = Context::new(ContextConfig::default().with_threads(2)).unwrap();
        let chunk = setup(&ctx);
        chunk.fill(FieldId::XVel1, 2.5);
        chunk.fill(FieldId::YVel1, -1.0);

        for direction in [Direction::X, Direction::Y] {
            advec_mom(&ctx, &chunk, Velocity::X, direction, Sweep::First).unwrap();
            advec_mom(&ctx, &chunk, Velocity::Y, direction, Sweep::First).unwrap();
        }

        let tile = &chunk.tiles[0];
        for i in 2..=8 {
            for j in 2..=7 {
                assert!((tile.field.xvel1.get(i, j) - 2.5).abs() < 1e-12);
                assert!((tile.field.yvel1.get(i, j) + 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_uniform_flux_keeps_uniform_velocity() {
        let ctx = Context::new(ContextConfig::default().with_threads(2)).unwrap();
        let chunk = setup(&ctx);
        chunk.fill(FieldId::XVel1, 1.0);
        // 均匀质量通量：每个节点流入等于流出
        chunk.fill(FieldId::MassFluxX, 0.1);
        advec_mom(&ctx, &chunk, Velocity::X, Direction::X, Sweep::Second).unwrap();

        let tile = &chunk.tiles[0];
        for i in 3..=7 {
            for j in 3..=6 {
                assert!((tile.field.xvel1.get(i, j) - 1.0).abs() < 1e-12, "({}, {})", i, j);
            }
        }
        // pre_vol 在第二次 X 扫描中等于 volume + Y 方向体积通量差
        let volume = tile.field.volume.get(4, 4);
        assert!((tile.field.work_array5.get(4, 4) - volume).abs() < 1e-12);
    }

    #[test]
    fn test_limiter_bounds() {
        // 单调数据：限制后的速度落在 donor 与 downwind 之间
        let v = limited_velocity(0.3, 1.0, 1.0, 0.0, 1.0, 2.0);
        assert!(v >= 1.0 && v <= 2.0);
        // 极值点：限制器关闭，退化为一阶迎风
        assert_eq!(limited_velocity(0.3, 1.0, 1.0, 0.0, 1.0, 0.5), 1.0);
    }
}
