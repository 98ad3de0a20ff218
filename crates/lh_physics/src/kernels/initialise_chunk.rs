// crates/lh_physics/src/kernels/initialise_chunk.rs

//! 网格几何初始化
//!
//! 由全局网格范围与 tile 的全局位置生成顶点/单元坐标、间距、单元体积与面面积。
//! 坐标覆盖包括 ghost 在内的整个数组。

use lh_config::GridConfig;
use lh_runtime::{Context, Range1d, Range2d};

use crate::error::HydroResult;
use crate::mesh::{Chunk, Tile};

/// 初始化单个 tile 的几何
pub fn initialise_tile(context: &Context, tile: &Tile, grid: &GridConfig) {
    let info = &tile.info;
    let field = &tile.field;
    let (dx, dy) = (grid.dx(), grid.dy());
    let xmin = grid.xmin + dx * (info.t_left - 1) as f64;
    let ymin = grid.ymin + dy * (info.t_bottom - 1) as f64;
    let (x_min, y_min) = (info.t_xmin as f64, info.t_ymin as f64);

    let (vertexx, vertexdx) = (field.vertexx.view(), field.vertexdx.view());
    context.par_ranged1(Range1d::new(0, vertexx.len()), move |j| {
        vertexx.set(j, xmin + dx * (j as f64 - 1.0 - x_min));
        vertexdx.set(j, dx);
    });

    let (vertexy, vertexdy) = (field.vertexy.view(), field.vertexdy.view());
    context.par_ranged1(Range1d::new(0, vertexy.len()), move |k| {
        vertexy.set(k, ymin + dy * (k as f64 - 1.0 - y_min));
        vertexdy.set(k, dy);
    });

    let (cellx, celldx) = (field.cellx.view(), field.celldx.view());
    context.par_ranged1(Range1d::new(0, cellx.len()), move |j| {
        cellx.set(j, 0.5 * (vertexx.get(j) + vertexx.get(j + 1)));
        celldx.set(j, dx);
    });

    let (celly, celldy) = (field.celly.view(), field.celldy.view());
    context.par_ranged1(Range1d::new(0, celly.len()), move |k| {
        celly.set(k, 0.5 * (vertexy.get(k) + vertexy.get(k + 1)));
        celldy.set(k, dy);
    });

    let volume = field.volume.view();
    context.par_ranged2(Range2d::new(0, 0, volume.size_x(), volume.size_y()), move |j, k| {
        volume.set(j, k, dx * dy);
    });

    let xarea = field.xarea.view();
    context.par_ranged2(Range2d::new(0, 0, xarea.size_x(), xarea.size_y()), move |j, k| {
        xarea.set(j, k, celldy.get(k));
    });

    let yarea = field.yarea.view();
    context.par_ranged2(Range2d::new(0, 0, yarea.size_x(), yarea.size_y()), move |j, k| {
        yarea.set(j, k, celldx.get(j));
    });
}

/// 初始化 chunk 内所有 tile 的几何
pub fn initialise_chunk(context: &Context, chunk: &Chunk, grid: &GridConfig) -> HydroResult<()> {
    for tile in &chunk.tiles {
        context.ensure_owned(&tile.field.volume)?;
        initialise_tile(context, tile, grid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Decomposition;
    use lh_runtime::ContextConfig;

    #[test]
    fn test_geometry_of_second_chunk() {
        let ctx = Context::new(ContextConfig::default().with_threads(2)).unwrap();
        let grid = GridConfig { x_cells: 8, y_cells: 4, xmin: 0.0, xmax: 8.0, ymin: -2.0, ymax: 2.0 };
        let d = Decomposition::new(8, 4, 2, 1).unwrap();
        let chunk = Chunk::allocate(&ctx, d.chunk(1).unwrap().clone(), d.tiles(1).unwrap()).unwrap();
        initialise_chunk(&ctx, &chunk, &grid).unwrap();

        let field = &chunk.tiles[0].field;
        // 第一个内部顶点是 chunk 左边界 x = 4
        assert!((field.vertexx.get(2) - 4.0).abs() < 1e-12);
        assert!((field.cellx.get(2) - 4.5).abs() < 1e-12);
        assert!((field.vertexy.get(2) + 2.0).abs() < 1e-12);
        assert!((field.volume.get(3, 3) - 1.0).abs() < 1e-12);
        assert!((field.xarea.get(0, 0) - 1.0).abs() < 1e-12);
        assert!((field.celldx.get(5) - 1.0).abs() < 1e-12);
    }
}
