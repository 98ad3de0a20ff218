// apps/lh_cli/src/commands/run.rs

//! 运行命令
//!
//! 每个 rank 构建自己的模拟状态，按全局解析图案初始化全部场，
//! 执行一次完整 halo 更新并逐位检查 ghost，随后运行若干步动量输运，
//! 最后输出全局守恒量汇总与可选的调试快照。
//!
//! 默认以线程模拟多个 rank；启用 `distributed` 特性后可用 `--mpi` 以 MPI 进程运行。
//! 任一 rank 的错误都是致命的：记录所在阶段后终止整个进程组。

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use clap::Args;
use lh_config::RunConfig;
use lh_physics::halo::ExchangeReport;
use lh_physics::kernels::{Direction, FieldSummary, Sweep};
use lh_physics::prelude::*;
use lh_physics::{dump, DumpOptions};
use lh_runtime::Context;
use tracing::{error, info, warn};

use super::load_config;

/// 初始化时写入 ghost 的值
const GHOST_FILL: f64 = 0.0;

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// rank 数（线程模式）
    #[arg(short, long, default_value = "1")]
    pub ranks: usize,

    /// 动量输运步数
    #[arg(short, long, default_value = "2")]
    pub steps: u64,

    /// 覆盖 X 方向单元数
    #[arg(long)]
    pub x_cells: Option<usize>,

    /// 覆盖 Y 方向单元数
    #[arg(long)]
    pub y_cells: Option<usize>,

    /// 覆盖每个 chunk 的 tile 数
    #[arg(long)]
    pub tiles: Option<usize>,

    /// 覆盖 halo 深度
    #[arg(long)]
    pub depth: Option<usize>,

    /// 经主机内存暂存通信缓冲
    #[arg(long)]
    pub staging: bool,

    /// 调试快照输出目录（每个 rank 一个文件）
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// 快照中包含数组内容
    #[arg(long)]
    pub dump_fields: bool,

    /// 以 MPI 进程运行（忽略 --ranks）
    #[cfg(feature = "distributed")]
    #[arg(long)]
    pub mpi: bool,
}

/// 单个 rank 的运行结果
#[derive(Debug, Clone, Copy)]
struct RankOutcome {
    rank: usize,
    mismatches: usize,
    first_exchange: ExchangeReport,
    summary: FieldSummary,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== LeafHydro halo 交换 ===");

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate().context("配置无效")?;

    #[cfg(feature = "distributed")]
    {
        if args.mpi {
            return run_mpi(&config, &args);
        }
    }

    if args.ranks == 0 {
        bail!("rank 数必须为正");
    }
    Decomposition::new(config.grid.x_cells, config.grid.y_cells, args.ranks, config.tiles_per_chunk)
        .context("网格无法分解")?;

    info!(
        ranks = args.ranks,
        x_cells = config.grid.x_cells,
        y_cells = config.grid.y_cells,
        tiles = config.tiles_per_chunk,
        depth = config.halo_depth,
        staging = config.staging_buffer,
        "启动线程 rank"
    );

    let start = Instant::now();
    let universe = local_universe(args.ranks);
    let outcomes = thread::scope(|s| -> Result<Vec<RankOutcome>> {
        let mut handles = Vec::with_capacity(universe.len());
        for transport in &universe {
            let (config, args) = (&config, &args);
            let handle = thread::Builder::new()
                .name(format!("rank-{}", transport.rank()))
                .spawn_scoped(s, move || run_or_abort(config, args, transport))
                .context("无法启动 rank 线程")?;
            handles.push(handle);
        }
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow::anyhow!("rank 线程 panic")))
            .collect()
    })?;

    report(&outcomes, start)
}

fn apply_overrides(config: &mut RunConfig, args: &RunArgs) {
    if let Some(x) = args.x_cells {
        config.grid.x_cells = x;
    }
    if let Some(y) = args.y_cells {
        config.grid.y_cells = y;
    }
    if let Some(tiles) = args.tiles {
        config.tiles_per_chunk = tiles;
    }
    if let Some(depth) = args.depth {
        config.halo_depth = depth;
    }
    if args.staging {
        config.staging_buffer = true;
    }
}

/// 运行一个 rank，失败时记录阶段并终止进程组
fn run_or_abort<T: Transport + ?Sized>(config: &RunConfig, args: &RunArgs, transport: &T) -> RankOutcome {
    match run_rank(config, args, transport) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(rank = transport.rank(), stage = err.stage(), "{}", err);
            transport.abort(1)
        }
    }
}

fn run_rank<T: Transport + ?Sized>(config: &RunConfig, args: &RunArgs, transport: &T) -> HydroResult<RankOutcome> {
    let rank = transport.rank();
    let context = Context::new(config.context_config())?;
    let mut state = SimulationState::build(config.clone(), context, rank, transport.size())?;

    for id in FieldId::ALL {
        state.chunk.fill(id, GHOST_FILL);
        state.chunk.fill_interior(&state.context, id, move |gx, gy| initial_value(id, gx, gy));
    }

    let depth = config.halo_depth;
    let global = (config.grid.x_cells, config.grid.y_cells);
    let first_exchange = state.update_halo(transport, &FieldSelection::all(), depth)?;

    let mut mismatches = 0;
    for id in FieldId::ALL {
        let check = verify_halo(&state.chunk, id, depth, global, GHOST_FILL, |gx, gy| initial_value(id, gx, gy));
        if let Some(first) = check.mismatches.first() {
            warn!(rank, field = %id, count = check.mismatches.len(), ?first, "halo 不一致");
        }
        mismatches += check.mismatches.len();
    }

    let advected = FieldSelection::of(&[
        FieldId::Density1,
        FieldId::XVel1,
        FieldId::YVel1,
        FieldId::VolFluxX,
        FieldId::VolFluxY,
        FieldId::MassFluxX,
        FieldId::MassFluxY,
    ]);
    for _ in 0..args.steps {
        let (first, second) = if state.run.advect_x {
            (Direction::X, Direction::Y)
        } else {
            (Direction::Y, Direction::X)
        };
        state.update_halo(transport, &advected, depth)?;
        state.advect_momentum(first, Sweep::First)?;
        state.update_halo(transport, &advected, depth)?;
        state.advect_momentum(second, Sweep::Second)?;

        state.run.advect_x = !state.run.advect_x;
        state.run.step += 1;
    }

    let summary = state.field_summary(transport)?;

    if let Some(dir) = &args.dump {
        std::fs::create_dir_all(dir).map_err(|source| HydroError::Io { path: dir.clone(), source })?;
        let path = dir.join(format!("dump_{}.txt", rank));
        dump(&state, path, DumpOptions { fields: args.dump_fields })?;
    }

    Ok(RankOutcome { rank, mismatches, first_exchange, summary })
}

/// 全局解析初始场，`gx`/`gy` 为 1 起始的全局编号
fn initial_value(id: FieldId, gx: i64, gy: i64) -> f64 {
    let density = 1.0 + 0.05 * (gx * 3 + gy * 5).rem_euclid(11) as f64;
    let energy = 2.5 + 0.01 * (gx + 2 * gy).rem_euclid(13) as f64;
    let flux = 1e-3 * (gx + gy).rem_euclid(5) as f64;
    match id {
        FieldId::Density0 | FieldId::Density1 => density,
        FieldId::Energy0 | FieldId::Energy1 => energy,
        FieldId::Pressure => 0.4 * density * energy,
        FieldId::Viscosity => 0.0,
        FieldId::Soundspeed => (1.4 * 0.4 * energy).sqrt(),
        FieldId::XVel0 | FieldId::XVel1 => 0.1 + 1e-3 * gy as f64,
        FieldId::YVel0 | FieldId::YVel1 => -0.05 + 1e-3 * gx as f64,
        FieldId::VolFluxX | FieldId::VolFluxY => flux,
        FieldId::MassFluxX | FieldId::MassFluxY => 1.1 * flux,
    }
}

fn report(outcomes: &[RankOutcome], start: Instant) -> Result<()> {
    let mismatches: usize = outcomes.iter().map(|o| o.mismatches).sum();
    let messages: usize = outcomes.iter().map(|o| o.first_exchange.messages).sum();
    let values: usize = outcomes.iter().map(|o| o.first_exchange.values_sent).sum();

    println!("=== 运行结果 ===");
    println!("rank 数: {}", outcomes.len());
    println!("首次交换: {} 条消息, {} 个数值", messages, values);
    for outcome in outcomes {
        println!("  rank {}: ghost 不一致 {}", outcome.rank, outcome.mismatches);
    }
    if let Some(first) = outcomes.first() {
        let s = &first.summary;
        println!("体积: {:.6e}", s.volume);
        println!("质量: {:.6e}", s.mass);
        println!("内能: {:.6e}", s.internal_energy);
        println!("动能: {:.6e}", s.kinetic_energy);
        println!("压力: {:.6e}", s.pressure);
    }
    println!("耗时: {:.3} s", start.elapsed().as_secs_f64());

    if mismatches > 0 {
        bail!("halo 检查失败: {} 处不一致", mismatches);
    }
    info!("halo 检查通过");
    Ok(())
}

#[cfg(feature = "distributed")]
fn run_mpi(config: &RunConfig, args: &RunArgs) -> Result<()> {
    use lh_physics::MpiTransport;

    let _universe = mpi::initialize().context("MPI 初始化失败")?;
    let transport = MpiTransport::new();
    info!(rank = transport.rank(), size = transport.size(), "MPI rank 启动");

    let start = Instant::now();
    let outcome = run_or_abort(config, args, &transport);
    let total = transport.all_reduce_sum(outcome.mismatches as f64)?;
    if transport.rank() == 0 {
        report(&[RankOutcome { mismatches: total as usize, ..outcome }], start)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ranks: usize, tiles: usize, dump: Option<PathBuf>) -> RunArgs {
        RunArgs {
            config: None,
            ranks,
            steps: 1,
            x_cells: Some(8),
            y_cells: Some(8),
            tiles: Some(tiles),
            depth: None,
            staging: false,
            dump,
            dump_fields: false,
            #[cfg(feature = "distributed")]
            mpi: false,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = RunConfig::default();
        let mut a = args(1, 4, None);
        a.depth = Some(1);
        a.staging = true;
        apply_overrides(&mut config, &a);
        assert_eq!((config.grid.x_cells, config.grid.y_cells), (8, 8));
        assert_eq!(config.tiles_per_chunk, 4);
        assert_eq!(config.halo_depth, 1);
        assert!(config.staging_buffer);
    }

    #[test]
    fn test_two_rank_run_with_dump() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(2, 2, Some(dir.path().to_path_buf()));
        execute(a).unwrap();
        assert!(dir.path().join("dump_0.txt").exists());
        assert!(dir.path().join("dump_1.txt").exists());
    }

    #[test]
    fn test_invalid_decomposition_rejected() {
        let mut a = args(3, 1, None);
        a.x_cells = Some(10);
        a.y_cells = Some(10);
        assert!(execute(a).is_err());
    }
}
