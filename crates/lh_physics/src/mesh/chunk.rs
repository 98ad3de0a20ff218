// crates/lh_physics/src/mesh/chunk.rs

//! Chunk 与 Tile
//!
//! 每个 rank 拥有一个 chunk，chunk 拥有若干 tile，tile 拥有一组设备场数组。

use lh_runtime::{Context, Range2d};
use tracing::debug;

use super::decompose::{ChunkLayout, TileInfo};
use super::{ChunkNeighbour, Face};
use crate::error::HydroResult;
use crate::fields::{FieldId, FieldKind, FieldSet, GHOST_LAYERS};

/// 一个 tile：拓扑信息与场数组
pub struct Tile {
    /// 布局与拓扑
    pub info: TileInfo,
    /// 场数组
    pub field: FieldSet,
}

impl Tile {
    /// 分配 tile 的全部场数组
    pub fn allocate(context: &Context, info: TileInfo) -> HydroResult<Self> {
        let field = FieldSet::allocate(context, info.x_cells(), info.y_cells())?;
        Ok(Self { info, field })
    }

    /// 某类场的内部（拥有的）索引区间
    pub fn interior(&self, kind: FieldKind) -> Range2d {
        let x_max = self.info.t_xmax;
        let y_max = self.info.t_ymax;
        Range2d::new(
            GHOST_LAYERS,
            GHOST_LAYERS,
            x_max + GHOST_LAYERS + kind.x_inc(),
            y_max + GHOST_LAYERS + kind.y_inc(),
        )
    }

    /// 用全局坐标函数填充某个场的内部
    ///
    /// `f` 接收 1 起始的全局单元（或顶点/面）编号。
    pub fn fill_interior<F>(&self, context: &Context, id: FieldId, f: F)
    where
        F: Fn(i64, i64) -> f64 + Send + Sync,
    {
        let view = self.field.get(id).view();
        let info = &self.info;
        context.par_ranged2(self.interior(id.kind()), move |x, y| {
            view.set(x, y, f(info.global_x(x), info.global_y(y)));
        });
    }
}

/// 一个 rank 的 chunk
pub struct Chunk {
    /// 布局与邻居
    pub layout: ChunkLayout,
    /// tile 列表（行优先）
    pub tiles: Vec<Tile>,
}

impl Chunk {
    /// 按布局分配 chunk 与其 tile
    pub fn allocate(context: &Context, layout: ChunkLayout, tiles: Vec<TileInfo>) -> HydroResult<Self> {
        let tiles = tiles
            .into_iter()
            .map(|info| Tile::allocate(context, info))
            .collect::<HydroResult<Vec<_>>>()?;
        debug!(
            task = layout.task,
            tiles = tiles.len(),
            bytes = context.allocated_bytes(),
            "chunk 场数组分配完成"
        );
        Ok(Self { layout, tiles })
    }

    /// 所在 rank
    #[inline]
    pub fn task(&self) -> usize {
        self.layout.task
    }

    /// X 方向单元数
    #[inline]
    pub fn x_cells(&self) -> usize {
        self.layout.x_cells()
    }

    /// Y 方向单元数
    #[inline]
    pub fn y_cells(&self) -> usize {
        self.layout.y_cells()
    }

    /// 某一面的邻居
    #[inline]
    pub fn neighbour(&self, face: Face) -> ChunkNeighbour {
        self.layout.neighbour(face)
    }

    /// 用全局坐标函数填充所有 tile 的某个场
    pub fn fill_interior<F>(&self, context: &Context, id: FieldId, f: F)
    where
        F: Fn(i64, i64) -> f64 + Send + Sync,
    {
        for tile in &self.tiles {
            tile.fill_interior(context, id, &f);
        }
    }

    /// 用常数填充所有 tile 的某个场（含 ghost）
    pub fn fill(&self, id: FieldId, value: f64) {
        for tile in &self.tiles {
            tile.field.get(id).fill(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Decomposition;
    use lh_runtime::ContextConfig;

    #[test]
    fn test_fill_interior_uses_global_coordinates() {
        let ctx = Context::new(ContextConfig::default().with_threads(2)).unwrap();
        let d = Decomposition::new(8, 4, 2, 2).unwrap();
        let layout = d.chunk(1).unwrap().clone();
        let chunk = Chunk::allocate(&ctx, layout, d.tiles(1).unwrap()).unwrap();
        chunk.fill(FieldId::Density0, -1.0);
        chunk.fill_interior(&ctx, FieldId::Density0, |gx, gy| (gx * 100 + gy) as f64);

        let tile = &chunk.tiles[0];
        let density = tile.field.get(FieldId::Density0);
        assert_eq!(density.get(2, 2), (tile.info.t_left as f64) * 100.0 + tile.info.t_bottom as f64);
        // ghost 未被触碰
        assert_eq!(density.get(1, 2), -1.0);
        assert_eq!(density.get(2, 1), -1.0);
    }

    #[test]
    fn test_interior_range_by_kind() {
        let ctx = Context::new(ContextConfig::default().with_threads(1)).unwrap();
        let d = Decomposition::new(4, 3, 1, 1).unwrap();
        let tile = Tile::allocate(&ctx, d.tiles(0).unwrap().remove(0)).unwrap();
        assert_eq!(tile.interior(FieldKind::Cell), Range2d::new(2, 2, 6, 5));
        assert_eq!(tile.interior(FieldKind::Vertex), Range2d::new(2, 2, 7, 6));
        assert_eq!(tile.interior(FieldKind::XFace), Range2d::new(2, 2, 7, 5));
    }
}
