//! 核心层：错误类型、循环状态、Agent 构建

pub mod builder;
pub mod error;
pub mod state;

pub use builder::{build_system_prompt, build_tool_registry, AgentBuilder, SYSTEM_PROMPT};
pub use error::AgentError;
pub use state::LoopState;
