//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Gemini / Mock）实现 LlmClient：输入有序消息序列，返回一段文本。
//! 调用失败以 LlmError 返回，由主循环决定是否中止本次运行。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// 后端调用错误
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("{0} environment variable not set")]
    MissingCredential(String),

    /// 请求构建或网络层失败
    #[error("request failed: {0}")]
    Request(String),

    /// 服务端返回错误
    #[error("{backend} API error: {message}")]
    Api { backend: String, message: String },
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 给定完整上下文，返回模型原始输出文本
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 后端名称，仅用于日志
    fn name(&self) -> &str {
        "llm"
    }
}
