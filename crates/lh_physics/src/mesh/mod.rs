// crates/lh_physics/src/mesh/mod.rs

//! 结构网格的分解与拓扑
//!
//! - [`decompose`]: 全局网格到 chunk、chunk 到 tile 的分解
//! - [`chunk`]: Chunk / Tile 运行时对象
//!
//! 全局单元编号从 1 开始；chunk 与 tile 均按从左下角开始的行优先次序编号。

pub mod chunk;
pub mod decompose;

pub use chunk::{Chunk, Tile};
pub use decompose::{split_counts, ChunkLayout, Decomposition, TileInfo};

use std::fmt;

/// 矩形面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// 左
    Left = 0,
    /// 右
    Right = 1,
    /// 下
    Bottom = 2,
    /// 上
    Top = 3,
}

impl Face {
    /// 全部面（左、右、下、上）
    pub const ALL: [Face; 4] = [Self::Left, Self::Right, Self::Bottom, Self::Top];

    /// 数组下标
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// 对面
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Bottom => Self::Top,
            Self::Top => Self::Bottom,
        }
    }

    /// 所属轴
    pub fn axis(self) -> Axis {
        match self {
            Self::Left | Self::Right => Axis::LeftRight,
            Self::Bottom | Self::Top => Axis::BottomTop,
        }
    }

    /// 发往该面邻居的消息标签
    pub fn send_tag(self) -> i32 {
        match self {
            Self::Left => 1,
            Self::Right => 2,
            Self::Bottom => 3,
            Self::Top => 4,
        }
    }

    /// 来自该面邻居的消息标签（即邻居向对面发送的标签）
    pub fn recv_tag(self) -> i32 {
        self.opposite().send_tag()
    }

    /// 名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Top => "top",
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 交换轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// 左右
    LeftRight,
    /// 下上
    BottomTop,
}

impl Axis {
    /// 交换次序：先左右后下上
    pub const ORDER: [Axis; 2] = [Self::LeftRight, Self::BottomTop];

    /// 该轴的两个面
    pub fn faces(self) -> [Face; 2] {
        match self {
            Self::LeftRight => [Face::Left, Face::Right],
            Self::BottomTop => [Face::Bottom, Face::Top],
        }
    }

    /// 名称
    pub fn name(self) -> &'static str {
        match self {
            Self::LeftRight => "left/right",
            Self::BottomTop => "bottom/top",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// chunk 某一面的邻居
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkNeighbour {
    /// 全局边界
    External,
    /// 邻居 chunk 所在 rank
    Rank(usize),
}

impl ChunkNeighbour {
    /// 邻居 rank
    pub fn rank(self) -> Option<usize> {
        match self {
            Self::External => None,
            Self::Rank(r) => Some(r),
        }
    }
}

/// tile 某一面的邻居
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileNeighbour {
    /// 全局边界
    External,
    /// 同一 chunk 内的 tile
    Tile(usize),
    /// 邻居 chunk 所在 rank
    Chunk(usize),
}
