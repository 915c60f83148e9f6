//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序循环返回预置脚本，忽略输入内容；调用次数用原子计数，便于断言。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// 未配置 mock_responses 时使用的默认脚本
pub const DEFAULT_MOCK_RESPONSES: [&str; 4] = [
    r#"<tool_call>{"tool": "fs.read", "arguments": {"path": "package.json"}}</tool_call>"#,
    "Let me check the project structure.",
    r#"<tool_call>{"tool": "tests.run", "arguments": {"type": "all"}}</tool_call>"#,
    "<terminate>",
];

/// Mock 客户端：第 n 次调用返回 responses[n % len]
#[derive(Debug)]
pub struct MockLlmClient {
    responses: Vec<String>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// 空脚本退回默认脚本
    pub fn new(responses: Vec<String>) -> Self {
        let responses = if responses.is_empty() {
            DEFAULT_MOCK_RESPONSES.iter().map(|s| s.to_string()).collect()
        } else {
            responses
        };
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses[n % self.responses.len()].clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
