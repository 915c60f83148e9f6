//! 可观测性：进程级 tracing 初始化 + 单次运行的文本日志（`.waa/agent.log`）

pub mod run_log;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use run_log::{LogLevel, RunLog};

/// 初始化 tracing；RUST_LOG 优先，否则 debug 模式用 `debug`，平时用 `info`
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
