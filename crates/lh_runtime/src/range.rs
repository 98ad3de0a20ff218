// crates/lh_runtime/src/range.rs

//! 一维与二维半开索引区间
//!
//! 区间描述内核分发的迭代空间，`from` 包含、`to` 不包含。

use std::fmt;

/// 一维半开区间 `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range1d {
    /// 起始索引（包含）
    pub from: usize,
    /// 结束索引（不包含）
    pub to: usize,
}

impl Range1d {
    /// 创建区间
    ///
    /// # Panics
    ///
    /// `from > to` 时 panic。
    pub fn new(from: usize, to: usize) -> Self {
        assert!(from <= to, "Range1d: 起始 {} 大于结束 {}", from, to);
        Self { from, to }
    }

    /// 元素数量
    #[inline]
    pub fn size(&self) -> usize {
        self.to - self.from
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for Range1d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Range1d{{ X[{}->{} ({})] }}", self.from, self.to, self.size())
    }
}

/// 二维半开区间 `[from_x, to_x) × [from_y, to_y)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range2d {
    /// X 起始（包含）
    pub from_x: usize,
    /// Y 起始（包含）
    pub from_y: usize,
    /// X 结束（不包含）
    pub to_x: usize,
    /// Y 结束（不包含）
    pub to_y: usize,
}

impl Range2d {
    /// 创建区间，参数次序为 `(from_x, from_y, to_x, to_y)`
    ///
    /// # Panics
    ///
    /// 任一维度起始大于结束时 panic。
    pub fn new(from_x: usize, from_y: usize, to_x: usize, to_y: usize) -> Self {
        assert!(from_x <= to_x, "Range2d: X 起始 {} 大于结束 {}", from_x, to_x);
        assert!(from_y <= to_y, "Range2d: Y 起始 {} 大于结束 {}", from_y, to_y);
        Self { from_x, from_y, to_x, to_y }
    }

    /// X 方向大小
    #[inline]
    pub fn size_x(&self) -> usize {
        self.to_x - self.from_x
    }

    /// Y 方向大小
    #[inline]
    pub fn size_y(&self) -> usize {
        self.to_y - self.from_y
    }

    /// 总元素数量
    #[inline]
    pub fn size(&self) -> usize {
        self.size_x() * self.size_y()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// 是否包含给定索引
    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.from_x..self.to_x).contains(&x) && (self.from_y..self.to_y).contains(&y)
    }
}

impl fmt::Display for Range2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range2d{{ X[{}->{} ({})] Y[{}->{} ({})]}}",
            self.from_x,
            self.to_x,
            self.size_x(),
            self.from_y,
            self.to_y,
            self.size_y()
        )
    }
}
