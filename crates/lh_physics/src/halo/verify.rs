// crates/lh_physics/src/halo/verify.rs

//! halo 正确性检查
//!
//! 场内部由全局坐标的解析函数填充、其余位置填充哨兵值后执行一次交换，
//! 深度范围内的每个位置都应满足：
//!
//! - 落在全局网格内：等于解析函数在该全局位置的值
//! - 落在全局网格外：仍为哨兵值（外部边界不被交换触碰）

use lh_runtime::Range2d;

use crate::fields::{FieldId, GHOST_LAYERS};
use crate::mesh::Chunk;

/// 一个不一致的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaloMismatch {
    /// tile 编号
    pub tile: usize,
    /// 数组 X 索引
    pub x: usize,
    /// 数组 Y 索引
    pub y: usize,
    /// 期望值
    pub expected: f64,
    /// 实际值
    pub actual: f64,
}

/// 检查结果
#[derive(Debug, Clone, Default)]
pub struct HaloCheck {
    /// 检查的位置数
    pub checked: usize,
    /// 不一致的位置
    pub mismatches: Vec<HaloMismatch>,
}

impl HaloCheck {
    /// 是否全部一致
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// 检查 chunk 内所有 tile 的某个场
///
/// `global_cells` 为全局单元数 `(x_cells, y_cells)`。
pub fn verify_halo<F>(
    chunk: &Chunk,
    id: FieldId,
    depth: usize,
    global_cells: (usize, usize),
    sentinel: f64,
    f: F,
) -> HaloCheck
where
    F: Fn(i64, i64) -> f64,
{
    let kind = id.kind();
    let x_limit = (global_cells.0 + kind.x_inc()) as i64;
    let y_limit = (global_cells.1 + kind.y_inc()) as i64;

    let mut check = HaloCheck::default();
    for tile in &chunk.tiles {
        let info = &tile.info;
        let host = tile.field.get(id).mirrored2();
        let region = Range2d::new(
            GHOST_LAYERS - depth,
            GHOST_LAYERS - depth,
            info.t_xmax + GHOST_LAYERS + kind.x_inc() + depth,
            info.t_ymax + GHOST_LAYERS + kind.y_inc() + depth,
        );

        for x in region.from_x..region.to_x {
            for y in region.from_y..region.to_y {
                let (gx, gy) = (info.global_x(x), info.global_y(y));
                let inside = (1..=x_limit).contains(&gx) && (1..=y_limit).contains(&gy);
                let expected = if inside { f(gx, gy) } else { sentinel };
                let actual = host.get(x, y);
                check.checked += 1;
                if actual.to_bits() != expected.to_bits() {
                    check.mismatches.push(HaloMismatch { tile: info.index, x, y, expected, actual });
                }
            }
        }
    }
    check
}
