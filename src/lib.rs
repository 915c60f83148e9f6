//! WAA (Web-App Agent) - 基于 LLM 的 Web 应用构建智能体
//!
//! 模块划分：
//! - **agent**: 单次运行的 Agent（启动流程 + 编排循环 + 保存历史）
//! - **config**: `.waa/config.json` + `WAA__*` 环境变量
//! - **core**: 错误类型、循环状态、工具注册表与系统提示词构建
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Gemini / Mock）
//! - **memory**: 只追加的对话历史与持久化
//! - **observability**: tracing 初始化与逐次运行日志
//! - **react**: 协议解析与编排主循环
//! - **tools**: 工具契约、注册表、执行器与内置工具（server / supertest / playwright / fs / todo）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::{Agent, RunReport};
pub use core::{AgentError, LoopState};
