// apps/lh_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示给定配置与 rank 数下的网格分解、tile 布局与交换缓冲大小。

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use lh_config::RunConfig;
use lh_physics::halo::pack::field_stride;
use lh_physics::mesh::{ChunkNeighbour, Decomposition};
use lh_physics::{Face, NUM_FIELDS};
use tracing::info;

use super::load_config;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// rank 数
    #[arg(short, long, default_value = "1")]
    pub ranks: usize,

    /// 显示每个 tile
    #[arg(long)]
    pub tiles: bool,

    /// 以 JSON 打印默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== LeafHydro 信息 ===");

    if args.defaults {
        let json = serde_json::to_string_pretty(&RunConfig::default())?;
        println!("{}", json);
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    let grid = &config.grid;
    let d = Decomposition::new(grid.x_cells, grid.y_cells, args.ranks, config.tiles_per_chunk)
        .context("网格无法分解")?;

    println!("=== 网格分解 ===");
    println!("全局网格: {} × {}", grid.x_cells, grid.y_cells);
    println!("chunk 布局: {} × {} ({} 个)", d.chunks_x, d.chunks_y, d.num_chunks());
    println!("每个 chunk 的 tile 布局: {} × {}", d.tiles_x, d.tiles_y);
    println!("halo 深度: {}, 主机暂存: {}", config.halo_depth, config.staging_buffer);

    for chunk in d.chunks() {
        let neighbours: Vec<String> = Face::ALL
            .iter()
            .map(|&face| match chunk.neighbour(face) {
                ChunkNeighbour::Rank(r) => format!("{}={}", face, r),
                ChunkNeighbour::External => format!("{}=-", face),
            })
            .collect();
        let lr = NUM_FIELDS * field_stride(chunk.y_cells(), config.halo_depth);
        let bt = NUM_FIELDS * field_stride(chunk.x_cells(), config.halo_depth);
        println!(
            "rank {:>3}: X[{}..={}] Y[{}..={}] 邻居 [{}] 缓冲 左右 {} / 上下 {}",
            chunk.task,
            chunk.left,
            chunk.right,
            chunk.bottom,
            chunk.top,
            neighbours.join(" "),
            lr,
            bt
        );

        if args.tiles {
            for tile in d.tiles(chunk.task)? {
                println!(
                    "    tile {:>2}: X[{}..={}] Y[{}..={}] 外缘 {:?}",
                    tile.index, tile.t_left, tile.t_right, tile.t_bottom, tile.t_top, tile.external_tile_mask
                );
            }
        }
    }

    Ok(())
}
