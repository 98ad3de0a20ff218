// apps/lh_cli/src/main.rs

//! LeafHydro 命令行界面
//!
//! 结构网格分解与 halo 交换的驱动程序。
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**：
//! - 配置只经 `RunConfig` 传入
//! - 每个 rank 一个 `SimulationState`，错误在此层记录阶段后终止进程组

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// LeafHydro halo 交换命令行工具
#[derive(Parser)]
#[command(name = "lh_cli")]
#[command(author = "LeafHydro Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LeafHydro structured-mesh halo exchange driver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 halo 交换
    Run(commands::run::RunArgs),
    /// 显示分解信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
