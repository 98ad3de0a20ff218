// crates/lh_physics/src/mesh/decompose.rs

//! 网格分解
//!
//! 将 `x_cells × y_cells` 的全局网格分为 `processes` 个 chunk，
//! 再将每个 chunk 分为 `tiles_per_chunk` 个 tile。
//!
//! # 分解规则
//!
//! 在 `n` 的因子中按 `c = 1, 2, ...` 依次尝试 `n/c × c` 的划分，
//! 取第一个满足 `(n/c) / c <= x_cells / y_cells` 的划分；
//! 若找不到，或划分退化为纯 Y 向，则沿较长的轴做一维划分。
//!
//! 每个方向的单元数必须能被该方向的划分数整除。

use tracing::info;

use super::{ChunkNeighbour, Face, TileNeighbour};
use crate::error::{HydroError, HydroResult};

/// 计算 `n` 个部件在 X、Y 方向的划分数
pub fn split_counts(n: usize, x_cells: usize, y_cells: usize) -> (usize, usize) {
    let mesh_ratio = x_cells as f64 / y_cells as f64;

    let mut split = None;
    for c in 1..=n {
        if n % c != 0 {
            continue;
        }
        let factor_x = (n / c) as f64;
        let factor_y = c as f64;
        if factor_x / factor_y <= mesh_ratio {
            split = Some((n / c, c));
            break;
        }
    }

    match split {
        Some((sx, sy)) if sy != n => (sx, sy),
        _ if mesh_ratio >= 1.0 => (n, 1),
        _ => (1, n),
    }
}

/// 单个 chunk 的布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    /// 所在 rank
    pub task: usize,
    /// chunk 网格坐标 `(cx, cy)`
    pub coords: (usize, usize),
    /// 最左单元（全局，含）
    pub left: usize,
    /// 最右单元（全局，含）
    pub right: usize,
    /// 最下单元（全局，含）
    pub bottom: usize,
    /// 最上单元（全局，含）
    pub top: usize,
    /// 四面邻居（按 `Face::index` 排列）
    pub neighbours: [ChunkNeighbour; 4],
}

impl ChunkLayout {
    /// X 方向单元数
    pub fn x_cells(&self) -> usize {
        self.right - self.left + 1
    }

    /// Y 方向单元数
    pub fn y_cells(&self) -> usize {
        self.top - self.bottom + 1
    }

    /// 某一面的邻居
    pub fn neighbour(&self, face: Face) -> ChunkNeighbour {
        self.neighbours[face.index()]
    }
}

/// tile 的布局与拓扑
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileInfo {
    /// chunk 内编号
    pub index: usize,
    /// 局部最小 X（恒为 1）
    pub t_xmin: usize,
    /// 局部最大 X（= X 方向单元数）
    pub t_xmax: usize,
    /// 局部最小 Y（恒为 1）
    pub t_ymin: usize,
    /// 局部最大 Y（= Y 方向单元数）
    pub t_ymax: usize,
    /// 最左单元（全局，含）
    pub t_left: usize,
    /// 最右单元（全局，含）
    pub t_right: usize,
    /// 最下单元（全局，含）
    pub t_bottom: usize,
    /// 最上单元（全局，含）
    pub t_top: usize,
    /// 四面邻居
    pub tile_neighbours: [TileNeighbour; 4],
    /// tile 是否位于 chunk 的该面外缘
    pub external_tile_mask: [bool; 4],
}

impl TileInfo {
    /// X 方向单元数
    pub fn x_cells(&self) -> usize {
        self.t_xmax - self.t_xmin + 1
    }

    /// Y 方向单元数
    pub fn y_cells(&self) -> usize {
        self.t_ymax - self.t_ymin + 1
    }

    /// 是否位于 chunk 的该面外缘
    #[inline]
    pub fn on_chunk_edge(&self, face: Face) -> bool {
        self.external_tile_mask[face.index()]
    }

    /// 某一面的邻居
    pub fn neighbour(&self, face: Face) -> TileNeighbour {
        self.tile_neighbours[face.index()]
    }

    /// 局部数组 X 索引对应的全局单元号（可能落在网格外）
    #[inline]
    pub fn global_x(&self, x: usize) -> i64 {
        self.t_left as i64 + x as i64 - 1 - self.t_xmin as i64
    }

    /// 局部数组 Y 索引对应的全局单元号（可能落在网格外）
    #[inline]
    pub fn global_y(&self, y: usize) -> i64 {
        self.t_bottom as i64 + y as i64 - 1 - self.t_ymin as i64
    }
}

/// 完整的两级分解
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// 全局 X 单元数
    pub x_cells: usize,
    /// 全局 Y 单元数
    pub y_cells: usize,
    /// X 方向 chunk 数
    pub chunks_x: usize,
    /// Y 方向 chunk 数
    pub chunks_y: usize,
    /// 每个 chunk 的 X 方向 tile 数
    pub tiles_x: usize,
    /// 每个 chunk 的 Y 方向 tile 数
    pub tiles_y: usize,
    chunks: Vec<ChunkLayout>,
}

impl Decomposition {
    /// 分解全局网格
    pub fn new(
        x_cells: usize,
        y_cells: usize,
        processes: usize,
        tiles_per_chunk: usize,
    ) -> HydroResult<Self> {
        if x_cells == 0 || y_cells == 0 {
            return Err(HydroError::configuration(format!(
                "网格尺寸必须为正: {} × {}",
                x_cells, y_cells
            )));
        }
        if processes == 0 || tiles_per_chunk == 0 {
            return Err(HydroError::configuration("进程数与 tile 数必须为正"));
        }

        let (chunks_x, chunks_y) = split_counts(processes, x_cells, y_cells);
        if x_cells % chunks_x != 0 || y_cells % chunks_y != 0 {
            return Err(HydroError::configuration(format!(
                "{} × {} 网格无法被 {} × {} 个 chunk 整除",
                x_cells, y_cells, chunks_x, chunks_y
            )));
        }
        let (chunk_w, chunk_h) = (x_cells / chunks_x, y_cells / chunks_y);

        let (tiles_x, tiles_y) = split_counts(tiles_per_chunk, chunk_w, chunk_h);
        if chunk_w % tiles_x != 0 || chunk_h % tiles_y != 0 {
            return Err(HydroError::configuration(format!(
                "{} × {} 的 chunk 无法被 {} × {} 个 tile 整除",
                chunk_w, chunk_h, tiles_x, tiles_y
            )));
        }

        let mut chunks = Vec::with_capacity(processes);
        for cy in 0..chunks_y {
            for cx in 0..chunks_x {
                let task = cy * chunks_x + cx;
                let neighbour = |exists: bool, rank: usize| {
                    if exists {
                        ChunkNeighbour::Rank(rank)
                    } else {
                        ChunkNeighbour::External
                    }
                };
                chunks.push(ChunkLayout {
                    task,
                    coords: (cx, cy),
                    left: cx * chunk_w + 1,
                    right: (cx + 1) * chunk_w,
                    bottom: cy * chunk_h + 1,
                    top: (cy + 1) * chunk_h,
                    neighbours: [
                        neighbour(cx > 0, task.wrapping_sub(1)),
                        neighbour(cx + 1 < chunks_x, task + 1),
                        neighbour(cy > 0, task.wrapping_sub(chunks_x)),
                        neighbour(cy + 1 < chunks_y, task + chunks_x),
                    ],
                });
            }
        }

        info!(
            chunks_x,
            chunks_y,
            tiles_x,
            tiles_y,
            chunk_w,
            chunk_h,
            "网格分解完成"
        );

        Ok(Self { x_cells, y_cells, chunks_x, chunks_y, tiles_x, tiles_y, chunks })
    }

    /// chunk 总数
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// 每个 chunk 的 tile 数
    pub fn tiles_per_chunk(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// 全部 chunk 布局
    pub fn chunks(&self) -> &[ChunkLayout] {
        &self.chunks
    }

    /// rank 对应的 chunk
    pub fn chunk(&self, rank: usize) -> HydroResult<&ChunkLayout> {
        self.chunks.get(rank).ok_or_else(|| {
            HydroError::configuration(format!("rank {} 超出 chunk 数 {}", rank, self.chunks.len()))
        })
    }

    /// rank 对应 chunk 的全部 tile
    pub fn tiles(&self, rank: usize) -> HydroResult<Vec<TileInfo>> {
        let chunk = self.chunk(rank)?;
        let tile_w = chunk.x_cells() / self.tiles_x;
        let tile_h = chunk.y_cells() / self.tiles_y;

        let mut tiles = Vec::with_capacity(self.tiles_per_chunk());
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let index = ty * self.tiles_x + tx;
                let edge = [tx == 0, tx + 1 == self.tiles_x, ty == 0, ty + 1 == self.tiles_y];
                let inner = [
                    index.wrapping_sub(1),
                    index + 1,
                    index.wrapping_sub(self.tiles_x),
                    index + self.tiles_x,
                ];

                let mut tile_neighbours = [TileNeighbour::External; 4];
                for face in Face::ALL {
                    let i = face.index();
                    tile_neighbours[i] = if !edge[i] {
                        TileNeighbour::Tile(inner[i])
                    } else {
                        match chunk.neighbour(face) {
                            ChunkNeighbour::Rank(r) => TileNeighbour::Chunk(r),
                            ChunkNeighbour::External => TileNeighbour::External,
                        }
                    };
                }

                let t_left = chunk.left + tx * tile_w;
                let t_bottom = chunk.bottom + ty * tile_h;
                tiles.push(TileInfo {
                    index,
                    t_xmin: 1,
                    t_xmax: tile_w,
                    t_ymin: 1,
                    t_ymax: tile_h,
                    t_left,
                    t_right: t_left + tile_w - 1,
                    t_bottom,
                    t_top: t_bottom + tile_h - 1,
                    tile_neighbours,
                    external_tile_mask: edge,
                });
            }
        }
        Ok(tiles)
    }

    /// 所有 tile 的拥有区间是否恰好覆盖全局网格一次
    pub fn covers_exactly(&self) -> bool {
        let mut owned = vec![0u32; self.x_cells * self.y_cells];
        for rank in 0..self.num_chunks() {
            let Ok(tiles) = self.tiles(rank) else {
                return false;
            };
            for tile in tiles {
                for gx in tile.t_left..=tile.t_right {
                    for gy in tile.t_bottom..=tile.t_top {
                        match owned.get_mut((gx - 1) * self.y_cells + (gy - 1)) {
                            Some(n) => *n += 1,
                            None => return false,
                        }
                    }
                }
            }
        }
        owned.iter().all(|&n| n == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_counts() {
        assert_eq!(split_counts(1, 10, 10), (1, 1));
        assert_eq!(split_counts(2, 10, 10), (2, 1));
        assert_eq!(split_counts(4, 10, 10), (2, 2));
        assert_eq!(split_counts(4, 40, 10), (4, 1));
        assert_eq!(split_counts(2, 10, 40), (1, 2));
        assert_eq!(split_counts(6, 30, 20), (3, 2));
        assert_eq!(split_counts(3, 10, 10), (3, 1));
    }

    #[test]
    fn test_four_ranks_square() {
        let d = Decomposition::new(4, 4, 4, 1).unwrap();
        assert_eq!((d.chunks_x, d.chunks_y), (2, 2));
        let c0 = d.chunk(0).unwrap();
        assert_eq!((c0.left, c0.right, c0.bottom, c0.top), (1, 2, 1, 2));
        assert_eq!(c0.neighbour(Face::Left), ChunkNeighbour::External);
        assert_eq!(c0.neighbour(Face::Right), ChunkNeighbour::Rank(1));
        assert_eq!(c0.neighbour(Face::Top), ChunkNeighbour::Rank(2));
        let c3 = d.chunk(3).unwrap();
        assert_eq!(c3.neighbour(Face::Bottom), ChunkNeighbour::Rank(1));
        assert_eq!(c3.neighbour(Face::Left), ChunkNeighbour::Rank(2));
        assert_eq!(c3.neighbour(Face::Top), ChunkNeighbour::External);
    }

    #[test]
    fn test_uneven_split_rejected() {
        let err = Decomposition::new(5, 4, 2, 1).unwrap_err();
        assert_eq!(err.stage(), "setup");
        assert!(Decomposition::new(4, 4, 1, 3).is_err());
    }

    #[test]
    fn test_tile_mask_and_neighbours() {
        let d = Decomposition::new(16, 8, 2, 4).unwrap();
        assert_eq!((d.tiles_x, d.tiles_y), (2, 2));
        let tiles = d.tiles(0).unwrap();
        assert_eq!(tiles.len(), 4);
        let t0 = &tiles[0];
        assert_eq!((t0.t_left, t0.t_bottom, t0.t_xmax, t0.t_ymax), (1, 1, 4, 4));
        assert_eq!(t0.external_tile_mask, [true, false, true, false]);
        assert_eq!(t0.neighbour(Face::Right), TileNeighbour::Tile(1));
        assert_eq!(t0.neighbour(Face::Top), TileNeighbour::Tile(2));
        assert_eq!(t0.neighbour(Face::Left), TileNeighbour::External);
        let t1 = &tiles[1];
        assert_eq!(t1.neighbour(Face::Right), TileNeighbour::Chunk(1));
        assert!(t1.on_chunk_edge(Face::Right));
    }

    #[test]
    fn test_global_index_mapping() {
        let d = Decomposition::new(8, 4, 2, 1).unwrap();
        let tile = &d.tiles(1).unwrap()[0];
        assert_eq!(tile.t_left, 5);
        // 数组索引 2 是第一个内部单元
        assert_eq!(tile.global_x(2), 5);
        assert_eq!(tile.global_x(0), 3);
        assert_eq!(tile.global_y(2), 1);
    }
}
