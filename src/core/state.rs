//! 循环状态机
//!
//! NotStarted → Running(turn) → {Terminated | Exhausted | ProtocolViolated}。
//! 三个终止态都正常返回给调用方，区别只在日志里记录的原因。

use serde::Serialize;

/// 编排循环的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    NotStarted,
    Running { turn: usize },
    /// 模型输出了 `<terminate>`
    Terminated { turn: usize },
    /// 达到 max_turns 仍未终止
    Exhausted { turns: usize },
    /// 模型输出既不是工具调用也不是终止标记
    ProtocolViolated { turn: usize },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Terminated { .. } | LoopState::Exhausted { .. } | LoopState::ProtocolViolated { .. }
        )
    }

    /// 已执行的回合数（每回合恰好一次模型调用）
    pub fn turns(&self) -> usize {
        match *self {
            LoopState::NotStarted => 0,
            LoopState::Running { turn }
            | LoopState::Terminated { turn }
            | LoopState::ProtocolViolated { turn } => turn,
            LoopState::Exhausted { turns } => turns,
        }
    }

    /// 写入运行日志的终止原因
    pub fn reason(&self) -> &'static str {
        match self {
            LoopState::NotStarted => "not started",
            LoopState::Running { .. } => "running",
            LoopState::Terminated { .. } => "terminated normally",
            LoopState::Exhausted { .. } => "exhausted turn budget",
            LoopState::ProtocolViolated { .. } => "protocol violation",
        }
    }
}
