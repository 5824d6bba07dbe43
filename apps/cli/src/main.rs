//! # Polhemus CLI
//!
//! Command-line interface for Polhemus Fastrak / Patriot trackers.
//!
//! ```bash
//! # 实时输出标定后的方位角（Ctrl-C 停止）
//! polhemus-cli stream --variant fastrak --ports "/dev/ttyUSB0 /dev/ttyS0"
//!
//! # 使用配置文件，运行 10 秒
//! polhemus-cli stream --config tracker.toml --duration 10
//!
//! # 离线解码抓取的串口数据
//! polhemus-cli decode --variant patriot capture.log
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{DecodeCommand, StreamCommand};

/// 默认日志过滤（可被 RUST_LOG 覆盖）
const DEFAULT_LOG_FILTER: &str = "polhemus_cli=info,polhemus_driver=info";

/// Polhemus CLI - 追踪器命令行工具
#[derive(Parser, Debug)]
#[command(name = "polhemus-cli")]
#[command(about = "Command-line interface for Polhemus motion trackers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 连接追踪器并实时输出方位角
    Stream {
        #[command(flatten)]
        args: StreamCommand,
    },

    /// 解码抓取的串口数据
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stream { args } => args.execute(),
        Commands::Decode { args } => args.execute(),
    }
}
