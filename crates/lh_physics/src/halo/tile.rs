// crates/lh_physics/src/halo/tile.rs

//! chunk 内 tile 之间的 halo 复制
//!
//! 同一 chunk 的 tile 共享设备内存，ghost 条带直接从邻居 tile 的内部复制，
//! 不经过交换缓冲区。先左右后下上，两个阶段之间是队列同步点，
//! 因此角点 ghost 在下上阶段随条带一起传递。

use lh_runtime::{Context, Queue, Range1d};
use tracing::trace;

use crate::error::HydroResult;
use crate::fields::{FieldId, FieldSelection};
use crate::mesh::{Axis, Chunk, Face, Tile, TileNeighbour};

/// 更新 chunk 内所有 tile 之间的 halo
pub fn update_tile_halo(
    context: &Context,
    chunk: &Chunk,
    selection: &FieldSelection,
    depth: usize,
) -> HydroResult<()> {
    if chunk.tiles.len() < 2 || selection.is_empty() {
        return Ok(());
    }

    for axis in Axis::ORDER {
        context.deferred(|queue| {
            for tile in &chunk.tiles {
                for face in axis.faces() {
                    if let TileNeighbour::Tile(n) = tile.info.neighbour(face) {
                        let source = &chunk.tiles[n];
                        for id in selection.iter() {
                            copy_strip(queue, face, tile, source, id, depth);
                        }
                    }
                }
            }
        })?;
        trace!(axis = %axis, tiles = chunk.tiles.len(), "tile halo 阶段完成");
    }
    Ok(())
}

/// 把 `source` 的内部条带复制到 `target` 在 `face` 一侧的 ghost
fn copy_strip<'s>(
    queue: &Queue<'_, 's>,
    face: Face,
    target: &'s Tile,
    source: &'s Tile,
    id: FieldId,
    depth: usize,
) {
    let kind = id.kind();
    let (x_inc, y_inc) = (kind.x_inc(), kind.y_inc());
    let dst = target.field.get(id).view();
    let src = source.field.get(id).view();
    let (t, s) = (&target.info, &source.info);

    match face.axis() {
        Axis::LeftRight => {
            let (x_min, x_max) = (t.t_xmin, t.t_xmax);
            let (src_min, src_max) = (s.t_xmin, s.t_xmax);
            let range = Range1d::new(t.t_ymin + 1 - depth, t.t_ymax + y_inc + depth + 2);
            queue.par_ranged1(range, move |k| {
                for j in 0..depth {
                    let (to, from) = match face {
                        Face::Left => (x_min - j, src_max + 1 - j),
                        _ => (x_max + x_inc + 2 + j, src_min + x_inc + 1 + j),
                    };
                    dst.set(to, k, src.get(from, k));
                }
            });
        }
        Axis::BottomTop => {
            let (y_min, y_max) = (t.t_ymin, t.t_ymax);
            let (src_min, src_max) = (s.t_ymin, s.t_ymax);
            let range = Range1d::new(t.t_xmin + 1 - depth, t.t_xmax + x_inc + depth + 2);
            queue.par_ranged1(range, move |x| {
                for k in 0..depth {
                    let (to, from) = match face {
                        Face::Bottom => (y_min - k, src_max + 1 - k),
                        _ => (y_max + y_inc + 2 + k, src_min + y_inc + 1 + k),
                    };
                    dst.set(x, to, src.get(x, from));
                }
            });
        }
    }
}
