// crates/lh_physics/src/state.rs

//! 模拟状态
//!
//! [`SimulationState`] 是一个 rank 的全部运行时状态：配置、执行上下文、
//! 分解结果、本 rank 的 chunk、交换协调器与标量运行状态。
//! 所有操作都显式接收它，不存在全局可变状态。

use lh_config::RunConfig;
use lh_runtime::Context;
use serde::Serialize;
use tracing::{debug, info};

use crate::comms::Transport;
use crate::error::{HydroError, HydroResult};
use crate::fields::FieldSelection;
use crate::halo::{update_tile_halo, ExchangeCoordinator, ExchangeReport};
use crate::kernels::{self, Direction, FieldSummary, Sweep, Velocity};
use crate::mesh::{Chunk, Decomposition};

// ============================================================
// 标量运行状态
// ============================================================

/// 标量运行状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunState {
    /// 步数
    pub step: u64,
    /// 模拟时间
    pub time: f64,
    /// 当前时间步长
    pub dt: f64,
    /// 上一步时间步长
    pub dtold: f64,
    /// 本步先做 X 方向输运
    pub advect_x: bool,
    /// 控制时间步的单元 X 下标
    pub jdt: usize,
    /// 控制时间步的单元 Y 下标
    pub kdt: usize,
    /// 运行结束
    pub complete: bool,
    /// 错误码（0 表示正常）
    pub error_condition: i32,
}

// ============================================================
// 模拟状态
// ============================================================

/// 一个 rank 的模拟状态
pub struct SimulationState {
    /// 运行配置
    pub config: RunConfig,
    /// 执行上下文
    pub context: Context,
    /// 全局分解
    pub decomposition: Decomposition,
    /// 本 rank 的 chunk
    pub chunk: Chunk,
    /// chunk 间交换协调器
    pub exchange: ExchangeCoordinator,
    /// 标量运行状态
    pub run: RunState,
}

impl SimulationState {
    /// 分解网格、分配本 rank 的 chunk 并生成几何
    pub fn build(config: RunConfig, context: Context, rank: usize, size: usize) -> HydroResult<Self> {
        config.validate()?;
        let grid = &config.grid;
        let decomposition = Decomposition::new(grid.x_cells, grid.y_cells, size, config.tiles_per_chunk)?;

        let layout = decomposition.chunk(rank)?.clone();
        let tiles = decomposition.tiles(rank)?;
        let chunk = Chunk::allocate(&context, layout, tiles)?;
        kernels::initialise_chunk(&context, &chunk, grid)?;

        let exchange =
            ExchangeCoordinator::new(&context, &chunk, config.halo_depth, config.staging_buffer)?;

        debug!(
            rank,
            x_cells = chunk.x_cells(),
            y_cells = chunk.y_cells(),
            bytes = context.allocated_bytes(),
            "rank 状态构建完成"
        );

        Ok(Self {
            config,
            context,
            decomposition,
            chunk,
            exchange,
            run: RunState { advect_x: true, ..Default::default() },
        })
    }

    /// 本 rank
    pub fn rank(&self) -> usize {
        self.chunk.task()
    }

    /// 更新所选场的 halo：先 chunk 内 tile 之间，再 chunk 之间
    pub fn update_halo<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        selection: &FieldSelection,
        depth: usize,
    ) -> HydroResult<ExchangeReport> {
        let max = self.exchange.max_depth();
        if depth == 0 || depth > max {
            return Err(HydroError::InvalidHaloDepth { depth, max });
        }
        if transport.rank() != self.rank() || transport.size() != self.decomposition.num_chunks() {
            return Err(HydroError::configuration(format!(
                "传输端 rank {}/{} 与 chunk {}/{} 不一致",
                transport.rank(),
                transport.size(),
                self.rank(),
                self.decomposition.num_chunks()
            )));
        }

        update_tile_halo(&self.context, &self.chunk, selection, depth)?;
        self.exchange.exchange(&self.context, &self.chunk, transport, selection, depth)
    }

    /// 一次动量输运（两个速度分量）
    pub fn advect_momentum(&self, direction: Direction, sweep: Sweep) -> HydroResult<()> {
        for velocity in [Velocity::X, Velocity::Y] {
            kernels::advec_mom(&self.context, &self.chunk, velocity, direction, sweep)?;
        }
        Ok(())
    }

    /// 全局守恒量汇总
    pub fn field_summary<T: Transport + ?Sized>(&self, transport: &T) -> HydroResult<FieldSummary> {
        let summary = kernels::field_summary(&self.context, &self.chunk, transport)?;
        if transport.rank() == 0 {
            info!(step = self.run.step, %summary, "守恒量汇总");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::local_universe;
    use crate::fields::FieldId;
    use lh_config::GridConfig;
    use lh_runtime::ContextConfig;

    fn config(x: usize, y: usize, tiles: usize) -> RunConfig {
        RunConfig {
            grid: GridConfig { x_cells: x, y_cells: y, ..Default::default() },
            tiles_per_chunk: tiles,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_single_rank() {
        let ctx = Context::new(ContextConfig::default().with_threads(2)).unwrap();
        let state = SimulationState::build(config(8, 8, 4), ctx, 0, 1).unwrap();
        assert_eq!(state.rank(), 0);
        assert_eq!(state.chunk.tiles.len(), 4);
        assert_eq!(state.exchange.max_depth(), 2);
        assert!(state.run.advect_x);
    }

    #[test]
    fn test_uneven_split_is_configuration_error() {
        let ctx = Context::new(ContextConfig::default().with_threads(1)).unwrap();
        let err = SimulationState::build(config(7, 7, 1), ctx, 0, 2).err().unwrap();
        assert_eq!(err.stage(), "setup");
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let ctx = Context::new(ContextConfig::default().with_threads(1)).unwrap();
        let mut state = SimulationState::build(config(4, 4, 1), ctx, 0, 1).unwrap();
        let universe = local_universe(1);
        let err = state.update_halo(&universe[0], &FieldSelection::all(), 3).unwrap_err();
        assert!(matches!(err, HydroError::InvalidHaloDepth { depth: 3, max: 2 }));
    }

    #[test]
    fn test_single_rank_external_faces_untouched() {
        let ctx = Context::new(ContextConfig::default().with_threads(2)).unwrap();
        let mut state = SimulationState::build(config(4, 4, 1), ctx, 0, 1).unwrap();
        state.chunk.fill(FieldId::Density0, -7.0);
        state.chunk.fill_interior(&state.context, FieldId::Density0, |x, y| (x + 10 * y) as f64);

        let universe = local_universe(1);
        let report = state
            .update_halo(&universe[0], &FieldSelection::of(&[FieldId::Density0]), 2)
            .unwrap();
        assert_eq!(report.messages, 0);
        assert_eq!(report.axes, 0);

        let density = state.chunk.tiles[0].field.density0.mirrored2();
        assert_eq!(density[(0, 3)], -7.0);
        assert_eq!(density[(6, 3)], -7.0);
        assert_eq!(density[(3, 2)], 12.0);
    }
}
