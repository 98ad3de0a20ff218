// crates/lh_runtime/src/dispatch.rs

//! 区间分发
//!
//! 将 `Range1d`/`Range2d` 上的逐点内核映射到上下文线程池。
//!
//! # 二维布局策略
//!
//! - `Normal`: 直接二维映射，X 外层、Y 内层两级并行
//! - `Linear`: 扁平化为一维，`x = from_x + id / size_y`，`y = from_y + id % size_y`
//! - `Round`: 两个维度向上取整到 [`ROUND_BLOCK`] 的倍数后按块分发，
//!   越界的填充索引提前退出
//!
//! 三种策略对每个索引恰好调用一次内核，结果与策略无关。
//!
//! # 阻塞与延迟
//!
//! `Context::par_ranged*` 在所有工作项完成后返回。
//! `Context::deferred` 打开一个作用域，作用域内通过 [`Queue`] 提交的分发
//! 在 `sync_kernels == false` 时异步执行，作用域结束即为同步点。

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{RuntimeError, RuntimeResult};
use crate::range::{Range1d, Range2d};

/// `Round` 策略的块边长
pub const ROUND_BLOCK: usize = 32;

/// 二维分发布局策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range2dMode {
    /// 直接二维映射
    #[default]
    Normal,
    /// 扁平化一维映射
    Linear,
    /// 分块映射
    Round,
}

impl Range2dMode {
    /// 全部策略
    pub const ALL: [Range2dMode; 3] = [Self::Normal, Self::Linear, Self::Round];

    /// 策略名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Linear => "linear",
            Self::Round => "round",
        }
    }
}

impl fmt::Display for Range2dMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Range2dMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "linear" => Ok(Self::Linear),
            "round" => Ok(Self::Round),
            other => Err(format!("未知的二维布局策略: {} (可选 normal/linear/round)", other)),
        }
    }
}

// ============================================================
// 执行核心
// ============================================================

fn run_range1<F>(range: Range1d, f: &F)
where
    F: Fn(usize) + Sync,
{
    (range.from..range.to).into_par_iter().for_each(f);
}

fn run_range2<F>(mode: Range2dMode, range: Range2d, f: &F)
where
    F: Fn(usize, usize) + Sync,
{
    let (sx, sy) = (range.size_x(), range.size_y());
    if sx == 0 || sy == 0 {
        return;
    }

    match mode {
        Range2dMode::Normal => {
            (0..sx).into_par_iter().for_each(|ix| {
                (0..sy)
                    .into_par_iter()
                    .for_each(|iy| f(range.from_x + ix, range.from_y + iy));
            });
        }
        Range2dMode::Linear => {
            (0..sx * sy).into_par_iter().for_each(|id| {
                f(range.from_x + id / sy, range.from_y + id % sy);
            });
        }
        Range2dMode::Round => {
            let blocks_x = sx.div_ceil(ROUND_BLOCK);
            let blocks_y = sy.div_ceil(ROUND_BLOCK);
            (0..blocks_x * blocks_y).into_par_iter().for_each(|block| {
                let (bx, by) = (block / blocks_y, block % blocks_y);
                for lx in 0..ROUND_BLOCK {
                    let ix = bx * ROUND_BLOCK + lx;
                    if ix >= sx {
                        return;
                    }
                    for ly in 0..ROUND_BLOCK {
                        let iy = by * ROUND_BLOCK + ly;
                        if iy >= sy {
                            break;
                        }
                        f(range.from_x + ix, range.from_y + iy);
                    }
                }
            });
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}

// ============================================================
// 阻塞分发
// ============================================================

impl Context {
    /// 一维阻塞分发，返回时所有工作项已完成
    pub fn par_ranged1<F>(&self, range: Range1d, f: F)
    where
        F: Fn(usize) + Send + Sync,
    {
        self.install(|| run_range1(range, &f));
    }

    /// 二维阻塞分发，使用上下文配置的布局策略
    pub fn par_ranged2<F>(&self, range: Range2d, f: F)
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        self.par_ranged2_with(self.range2d_mode(), range, f);
    }

    /// 二维阻塞分发，显式指定布局策略
    pub fn par_ranged2_with<F>(&self, mode: Range2dMode, range: Range2d, f: F)
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        self.install(|| run_range2(mode, range, &f));
    }

    /// 二维并行归约
    ///
    /// `combine` 需满足结合律；`identity` 为单位元。
    pub fn par_reduce2<R, M, C>(&self, range: Range2d, identity: R, map: M, combine: C) -> R
    where
        R: Copy + Send + Sync,
        M: Fn(usize, usize) -> R + Send + Sync,
        C: Fn(R, R) -> R + Send + Sync,
    {
        let sy = range.size_y();
        if range.is_empty() {
            return identity;
        }
        self.install(|| {
            (0..range.size())
                .into_par_iter()
                .map(|id| map(range.from_x + id / sy, range.from_y + id % sy))
                .reduce(|| identity, &combine)
        })
    }

    /// 打开延迟作用域
    ///
    /// 作用域内提交的分发在作用域返回前全部完成。内核 panic 被捕获并
    /// 转换为 `RuntimeError::Kernel`。
    pub fn deferred<'scope, R, F>(&self, body: F) -> RuntimeResult<R>
    where
        F: FnOnce(&Queue<'_, 'scope>) -> R + Send,
        R: Send,
    {
        let _guard = self.enter_scope();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool().scope(|scope: &rayon::Scope<'scope>| {
                let queue = Queue { scope, context: self };
                body(&queue)
            })
        }));
        outcome.map_err(|payload| RuntimeError::Kernel { message: panic_message(payload) })
    }
}

// ============================================================
// 延迟队列
// ============================================================

/// 延迟作用域内的队列句柄
pub struct Queue<'a, 'scope> {
    scope: &'a rayon::Scope<'scope>,
    context: &'a Context,
}

impl<'a, 'scope> Queue<'a, 'scope> {
    /// 所属上下文
    #[inline]
    pub fn context(&self) -> &'a Context {
        self.context
    }

    /// 一维分发
    pub fn par_ranged1<F>(&self, range: Range1d, f: F)
    where
        F: Fn(usize) + Send + Sync + 'scope,
    {
        if self.context.sync_kernels() {
            self.context.par_ranged1(range, f);
        } else {
            self.scope.spawn(move |_| run_range1(range, &f));
        }
    }

    /// 二维分发
    pub fn par_ranged2<F>(&self, range: Range2d, f: F)
    where
        F: Fn(usize, usize) + Send + Sync + 'scope,
    {
        let mode = self.context.range2d_mode();
        if self.context.sync_kernels() {
            self.context.par_ranged2_with(mode, range, f);
        } else {
            self.scope.spawn(move |_| run_range2(mode, range, &f));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(mode: Range2dMode, sync: bool) -> Context {
        Context::new(
            ContextConfig::default()
                .with_threads(4)
                .with_range2d_mode(mode)
                .with_sync_kernels(sync),
        )
        .unwrap()
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("ROUND".parse::<Range2dMode>().unwrap(), Range2dMode::Round);
        assert!("diagonal".parse::<Range2dMode>().is_err());
        assert_eq!(Range2dMode::Linear.to_string(), "linear");
    }

    #[test]
    fn test_mode_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Range2dMode::Round).unwrap(), "\"round\"");
        let mode: Range2dMode = serde_json::from_str("\"linear\"").unwrap();
        assert_eq!(mode, Range2dMode::Linear);
    }

    #[test]
    fn test_each_index_visited_once_all_modes() {
        // 非 32 倍数的尺寸覆盖 Round 策略的填充路径
        let range = Range2d::new(3, 1, 3 + 45, 1 + 33);
        for mode in Range2dMode::ALL {
            let ctx = context(mode, true);
            let hits: Vec<AtomicUsize> = (0..64 * 64).map(|_| AtomicUsize::new(0)).collect();
            ctx.par_ranged2(range, |x, y| {
                hits[x * 64 + y].fetch_add(1, Ordering::Relaxed);
            });
            for x in 0..64 {
                for y in 0..64 {
                    let expected = usize::from(range.contains(x, y));
                    assert_eq!(hits[x * 64 + y].load(Ordering::Relaxed), expected, "{} ({},{})", mode, x, y);
                }
            }
        }
    }

    #[test]
    fn test_empty_ranges_do_nothing() {
        let ctx = context(Range2dMode::Round, true);
        let calls = AtomicUsize::new(0);
        ctx.par_ranged2(Range2d::new(4, 4, 4, 9), |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        ctx.par_ranged1(Range1d::new(2, 2), |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_reduce_sum() {
        let ctx = context(Range2dMode::Normal, true);
        let sum = ctx.par_reduce2(Range2d::new(0, 0, 10, 20), 0usize, |x, y| x + y, |a, b| a + b);
        let expected: usize = (0..10).flat_map(|x| (0..20).map(move |y| x + y)).sum();
        assert_eq!(sum, expected);
    }

    #[test]
    fn test_deferred_completes_before_return() {
        for sync in [true, false] {
            let ctx = context(Range2dMode::Linear, sync);
            let counter = AtomicUsize::new(0);
            let value = ctx
                .deferred(|queue| {
                    queue.par_ranged1(Range1d::new(0, 1000), |_| {
                        counter.fetch_add(1, Ordering::Relaxed);
                    });
                    queue.par_ranged2(Range2d::new(0, 0, 10, 10), |_, _| {
                        counter.fetch_add(1, Ordering::Relaxed);
                    });
                    7
                })
                .unwrap();
            assert_eq!(value, 7);
            assert_eq!(counter.load(Ordering::Relaxed), 1100);
            assert!(ctx.synchronize().is_ok());
        }
    }

    #[test]
    fn test_deferred_kernel_panic_becomes_error() {
        let ctx = context(Range2dMode::Normal, false);
        let result = ctx.deferred(|queue| {
            queue.par_ranged1(Range1d::new(0, 8), |i| {
                if i == 5 {
                    panic!("坏工作项 {}", i);
                }
            });
        });
        match result {
            Err(RuntimeError::Kernel { message }) => assert!(message.contains("坏工作项")),
            other => panic!("期望内核错误, 得到 {:?}", other.map(|_| ())),
        }
        assert!(ctx.synchronize().is_ok());
    }
}
