// apps/lh_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 解析并验证配置文件；给出 rank 数时还检查网格能否整除分解。

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use lh_config::RunConfig;
use lh_physics::mesh::Decomposition;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 检查能否分解到该 rank 数
    #[arg(short, long)]
    pub ranks: Option<usize>,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== LeafHydro 配置验证 ===");

    let mut result = ValidationResult::default();
    if let Some(config) = validate_config(&args.config, &mut result) {
        if let Some(ranks) = args.ranks {
            validate_decomposition(&config, ranks, &mut result);
        }
    }

    print_validation_result(&result, args.strict)
}

fn validate_config(path: &Path, result: &mut ValidationResult) -> Option<RunConfig> {
    println!("检查配置文件: {}", path.display());

    let config = match RunConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            result.add_error(e.to_string());
            return None;
        }
    };

    let grid = &config.grid;
    let aspect = grid.dx() / grid.dy();
    if !(0.1..=10.0).contains(&aspect) {
        result.add_warning(format!("单元长宽比 {:.3} 偏离 1 较大", aspect));
    }
    if config.halo_depth < 2 {
        result.add_warning("halo 深度 1 不足以支持二阶输运模板");
    }
    if config.staging_buffer {
        result.add_warning("主机暂存仅用于无法直接访问设备内存的传输层");
    }

    println!("  ✓ 配置格式有效");
    Some(config)
}

fn validate_decomposition(config: &RunConfig, ranks: usize, result: &mut ValidationResult) {
    let grid = &config.grid;
    match Decomposition::new(grid.x_cells, grid.y_cells, ranks, config.tiles_per_chunk) {
        Ok(d) => println!(
            "  ✓ {} 个 rank: {} × {} chunk, 每个 chunk {} × {} tile",
            ranks, d.chunks_x, d.chunks_y, d.tiles_x, d.tiles_y
        ),
        Err(e) => result.add_error(e.to_string()),
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("{}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("{}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    if result.is_ok(strict) {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!("验证失败：发现 {} 个错误，{} 个警告", result.errors.len(), result.warnings.len())
    }
}
