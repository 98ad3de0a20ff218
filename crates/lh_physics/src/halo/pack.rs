// crates/lh_physics/src/halo/pack.rs

//! halo 打包与解包
//!
//! 把 tile 边缘的条带复制进（打包）或复制出（解包）一维交换缓冲区。
//!
//! # 缓冲区布局
//!
//! 每个选中的场在缓冲区中占一段，偏移按 [`FieldId::ALL`] 次序累加，
//! 每段长度为 `depth * (edge_cells + 5)`，其中 `edge_cells` 是 chunk
//! 在交换面方向上的单元数。
//!
//! - 左右面：条带沿 Y 方向，元素 `(j, k)` 位于 `base + j + row * depth`
//! - 下上面：条带沿 X 方向，元素 `(j, k)` 位于 `base + col + k * row_stride`，
//!   `row_stride = chunk_x_cells + x_inc + 2 * depth`
//!
//! `base` 额外包含 tile 相对 chunk 的位移，因此同一 chunk 边上的多个 tile
//! 写入互不冲突的区段（相邻 tile 在 ghost 行上的重叠写入值相同）。
//!
//! # 索引（数组索引，内部从 2 开始）
//!
//! | 面 | 打包读取 | 解包写入 |
//! |----|----------|----------|
//! | 左 | `x_min + x_inc + 1 + j` | `x_min - j` |
//! | 右 | `x_max + 1 - j` | `x_max + x_inc + 2 + j` |
//! | 下 | `y_min + y_inc + 1 + k` | `y_min - k` |
//! | 上 | `y_max + 1 - k` | `y_max + y_inc + 2 + k` |

use lh_runtime::{Queue, Range1d, View1D, View2D};

use crate::fields::{FieldId, FieldKind, FieldSelection, NUM_FIELDS};
use crate::mesh::{Axis, ChunkLayout, Face, Tile, TileInfo};

/// 每个场在交换缓冲区中预留的额外长度
pub const MESSAGE_PADDING: usize = 5;

/// 单个场一段消息的长度
#[inline]
pub fn field_stride(edge_cells: usize, depth: usize) -> usize {
    depth * (edge_cells + MESSAGE_PADDING)
}

/// 一次交换中各场的缓冲区偏移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaloOffsets {
    offsets: [Option<usize>; NUM_FIELDS],
    end: usize,
}

impl HaloOffsets {
    /// 按选择与深度累加偏移
    pub fn new(selection: &FieldSelection, depth: usize, edge_cells: usize) -> Self {
        let stride = field_stride(edge_cells, depth);
        let mut offsets = [None; NUM_FIELDS];
        let mut end = 0;
        for id in selection.iter() {
            offsets[id.index()] = Some(end);
            end += stride;
        }
        Self { offsets, end }
    }

    /// 场的起始偏移
    #[inline]
    pub fn offset(&self, id: FieldId) -> Option<usize> {
        self.offsets[id.index()]
    }

    /// 打包结束位置（= 消息长度）
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }
}

/// 复制方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// 场 → 缓冲区
    Pack,
    /// 缓冲区 → 场
    Unpack,
}

impl Transfer {
    #[inline]
    fn apply(self, field: View2D<'_, f64>, x: usize, y: usize, buffer: View1D<'_, f64>, index: usize) {
        match self {
            Self::Pack => buffer.set(index, field.get(x, y)),
            Self::Unpack => field.set(x, y, buffer.get(index)),
        }
    }
}

/// 打包或解包一个 tile 在某一面上所有选中场
#[allow(clippy::too_many_arguments)]
pub fn transfer_tile<'s>(
    queue: &Queue<'_, 's>,
    face: Face,
    transfer: Transfer,
    tile: &'s Tile,
    chunk: &ChunkLayout,
    buffer: View1D<'s, f64>,
    selection: &FieldSelection,
    depth: usize,
    offsets: &HaloOffsets,
) {
    for id in selection.iter() {
        let Some(offset) = offsets.offset(id) else {
            continue;
        };
        let kind = id.kind();
        let (base, row_stride) = match face.axis() {
            Axis::LeftRight => (offset + (tile.info.t_bottom - chunk.bottom) * depth, 0),
            Axis::BottomTop => (
                offset + (tile.info.t_left - chunk.left),
                chunk.x_cells() + kind.x_inc() + 2 * depth,
            ),
        };
        strip(
            queue,
            face,
            transfer,
            &tile.info,
            kind,
            depth,
            base,
            row_stride,
            tile.field.get(id).view(),
            buffer,
        );
    }
}

/// 打包一个 tile
#[allow(clippy::too_many_arguments)]
pub fn pack_tile<'s>(
    queue: &Queue<'_, 's>,
    face: Face,
    tile: &'s Tile,
    chunk: &ChunkLayout,
    buffer: View1D<'s, f64>,
    selection: &FieldSelection,
    depth: usize,
    offsets: &HaloOffsets,
) {
    transfer_tile(queue, face, Transfer::Pack, tile, chunk, buffer, selection, depth, offsets);
}

/// 解包一个 tile
#[allow(clippy::too_many_arguments)]
pub fn unpack_tile<'s>(
    queue: &Queue<'_, 's>,
    face: Face,
    tile: &'s Tile,
    chunk: &ChunkLayout,
    buffer: View1D<'s, f64>,
    selection: &FieldSelection,
    depth: usize,
    offsets: &HaloOffsets,
) {
    transfer_tile(queue, face, Transfer::Unpack, tile, chunk, buffer, selection, depth, offsets);
}

#[allow(clippy::too_many_arguments)]
fn strip<'s>(
    queue: &Queue<'_, 's>,
    face: Face,
    transfer: Transfer,
    info: &TileInfo,
    kind: FieldKind,
    depth: usize,
    base: usize,
    row_stride: usize,
    field: View2D<'s, f64>,
    buffer: View1D<'s, f64>,
) {
    let (x_min, x_max, y_min, y_max) = (info.t_xmin, info.t_xmax, info.t_ymin, info.t_ymax);
    let (x_inc, y_inc) = (kind.x_inc(), kind.y_inc());

    match face.axis() {
        Axis::LeftRight => {
            let range = Range1d::new(y_min + 1 - depth, y_max + y_inc + depth + 2);
            let column = move |j: usize| match (face, transfer) {
                (Face::Left, Transfer::Pack) => x_min + x_inc + 1 + j,
                (Face::Left, Transfer::Unpack) => x_min - j,
                (_, Transfer::Pack) => x_max + 1 - j,
                (_, Transfer::Unpack) => x_max + x_inc + 2 + j,
            };
            queue.par_ranged1(range, move |k| {
                let row = k - range.from;
                for j in 0..depth {
                    transfer.apply(field, column(j), k, buffer, base + j + row * depth);
                }
            });
        }
        Axis::BottomTop => {
            let range = Range1d::new(x_min + 1 - depth, x_max + x_inc + depth + 2);
            let row = move |k: usize| match (face, transfer) {
                (Face::Bottom, Transfer::Pack) => y_min + y_inc + 1 + k,
                (Face::Bottom, Transfer::Unpack) => y_min - k,
                (_, Transfer::Pack) => y_max + 1 - k,
                (_, Transfer::Unpack) => y_max + y_inc + 2 + k,
            };
            queue.par_ranged1(range, move |x| {
                let col = x - range.from;
                for k in 0..depth {
                    transfer.apply(field, x, row(k), buffer, base + col + k * row_stride);
                }
            });
        }
    }
}
