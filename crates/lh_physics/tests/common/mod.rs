// crates/lh_physics/tests/common/mod.rs

//! 集成测试共用的多 rank 驱动

#![allow(dead_code)]

use std::thread;
use std::time::Duration;

use lh_config::{GridConfig, RunConfig};
use lh_physics::prelude::*;
use lh_runtime::Context;

/// ghost 初始值
pub const SENTINEL: f64 = -999.25;

/// 每个场不同的全局解析图案
pub fn pattern(id: FieldId) -> impl Fn(i64, i64) -> f64 + Send + Sync + Copy {
    let base = (id.index() as i64 + 1) * 100_000;
    move |gx, gy| (base + gx * 1000 + gy) as f64 + 0.125
}

/// 构造运行配置
pub fn config(x_cells: usize, y_cells: usize, tiles: usize, staging: bool) -> RunConfig {
    RunConfig {
        grid: GridConfig {
            x_cells,
            y_cells,
            xmax: x_cells as f64,
            ymax: y_cells as f64,
            ..Default::default()
        },
        tiles_per_chunk: tiles,
        staging_buffer: staging,
        threads: Some(2),
        ..Default::default()
    }
}

/// 为每个 rank 启动一个线程，按配置的分发策略构建状态，填充图案后运行 `body`，按 rank 顺序收集结果
pub fn run_ranks<R, F>(config: &RunConfig, ranks: usize, body: F) -> Vec<R>
where
    R: Send,
    F: Fn(&mut SimulationState, &LocalTransport) -> R + Sync,
{
    let universe: Vec<LocalTransport> = local_universe(ranks)
        .into_iter()
        .map(|t| t.with_timeout(Duration::from_secs(30)))
        .collect();

    thread::scope(|s| {
        let handles: Vec<_> = universe
            .iter()
            .map(|transport| {
                let body = &body;
                s.spawn(move || {
                    let context = Context::new(config.context_config()).expect("创建上下文失败");
                    let mut state =
                        SimulationState::build(config.clone(), context, transport.rank(), ranks)
                            .expect("构建状态失败");
                    fill_all(&state);
                    body(&mut state, transport)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("rank 线程 panic")).collect()
    })
}

/// ghost 置为哨兵值，内部按全局图案填充
pub fn fill_all(state: &SimulationState) {
    for id in FieldId::ALL {
        state.chunk.fill(id, SENTINEL);
        state.chunk.fill_interior(&state.context, id, pattern(id));
    }
}
