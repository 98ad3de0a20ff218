// crates/lh_runtime/tests/dispatch.rs

//! 区间分发集成测试
//!
//! 验证三种二维布局策略产生逐位相同的结果，以及延迟作用域的次序语义。

use lh_runtime::prelude::*;

fn context(mode: Range2dMode, sync: bool) -> Context {
    Context::new(
        ContextConfig::default()
            .with_threads(3)
            .with_range2d_mode(mode)
            .with_sync_kernels(sync),
    )
    .expect("创建上下文失败")
}

/// 在缓冲区上运行一个五点模板，返回结果快照
fn run_stencil(mode: Range2dMode) -> Vec<f64> {
    let ctx = context(mode, true);
    let (nx, ny) = (70, 37);
    let input = Buffer2D::<f64>::new(&ctx, nx, ny).unwrap();
    let output = Buffer2D::<f64>::new(&ctx, nx, ny).unwrap();

    let src = input.view();
    ctx.par_ranged2(Range2d::new(0, 0, nx, ny), move |i, j| {
        src.set(i, j, ((i * 31 + j * 17) % 13) as f64 * 0.25);
    });

    let (src, dst) = (input.view(), output.view());
    ctx.par_ranged2(Range2d::new(1, 1, nx - 1, ny - 1), move |i, j| {
        let value = src.get(i, j) * 4.0
            - src.get(i - 1, j)
            - src.get(i + 1, j)
            - src.get(i, j - 1)
            - src.get(i, j + 1);
        dst.set(i, j, value);
    });
    output.mirrored()
}

#[test]
fn test_layout_strategies_bitwise_identical() {
    let normal = run_stencil(Range2dMode::Normal);
    for mode in [Range2dMode::Linear, Range2dMode::Round] {
        let other = run_stencil(mode);
        assert_eq!(normal.len(), other.len());
        for (a, b) in normal.iter().zip(&other) {
            assert_eq!(a.to_bits(), b.to_bits(), "{} 结果不一致", mode);
        }
    }
}

#[test]
fn test_deferred_scope_orders_before_readback() {
    for sync in [true, false] {
        let ctx = context(Range2dMode::Round, sync);
        let a = Buffer1D::<f64>::new(&ctx, 500).unwrap();
        let b = Buffer2D::<f64>::new(&ctx, 40, 40).unwrap();
        let (va, vb) = (a.view(), b.view());
        ctx.deferred(|queue| {
            queue.par_ranged1(Range1d::new(0, 500), move |i| va.set(i, i as f64));
            queue.par_ranged2(Range2d::new(0, 0, 40, 40), move |i, j| vb.set(i, j, 2.0));
        })
        .unwrap();
        let host = a.mirrored();
        assert_eq!(host[499], 499.0);
        assert!(b.mirrored().iter().all(|&v| v == 2.0));
    }
}

#[test]
fn test_buffers_from_two_contexts_are_independent() {
    let c1 = context(Range2dMode::Normal, true);
    let c2 = context(Range2dMode::Normal, true);
    let b1 = Buffer1D::<f64>::new(&c1, 16).unwrap();
    let b2 = Buffer1D::<f64>::new(&c2, 32).unwrap();
    assert!(c1.ensure_owned(&b1).is_ok());
    assert!(c1.ensure_owned(&b2).is_err());
    assert_eq!(c1.allocated_bytes(), 128);
    assert_eq!(c2.allocated_bytes(), 256);
}
