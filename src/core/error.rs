//! Agent 错误类型
//!
//! 只有启动阶段（配置、凭证、日志文件、指令文件）和 LLM 调用失败会以 AgentError 向上传播；
//! 回合内的解析失败、工具失败都记录进 History，不会中止循环。

use std::path::PathBuf;

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中会中止本次运行的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown llm_type: {0}. Use 'gemini', 'openai', 'deepseek' or 'mock'.")]
    UnknownLlmType(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),

    /// 上一次运行留下的日志仍在，拒绝覆盖
    #[error("Log file already exists: {}. Remove it to start a new run.", .0.display())]
    LogExists(PathBuf),

    #[error("Instruction file not found: {}", .0.display())]
    InstructionNotFound(PathBuf),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
