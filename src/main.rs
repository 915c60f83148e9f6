//! WAA 命令行入口
//!
//! `waa [-w <dir>] [--debug]`：在工作目录上跑一次 Agent，启动失败时以非零状态退出。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use waa::{observability, Agent};

#[derive(Parser, Debug)]
#[command(name = "waa", version, about = "WAA (Web-App Agent)")]
struct Cli {
    /// 工作目录（需包含 .waa/config.json 与 .waa/instruction.md）
    #[arg(short = 'w', long = "working-dir", default_value = ".")]
    working_dir: PathBuf,

    /// 把运行日志同步输出到终端
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init(cli.debug);

    let working_dir = cli
        .working_dir
        .canonicalize()
        .with_context(|| format!("Working directory not found: {}", cli.working_dir.display()))?;

    let report = Agent::new(&working_dir, cli.debug)
        .run()
        .await
        .context("Agent run failed")?;

    println!(
        "Agent finished: {} after {} turn(s)",
        report.state.reason(),
        report.state.turns()
    );
    Ok(())
}
