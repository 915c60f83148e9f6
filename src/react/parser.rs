//! 响应协议解析
//!
//! 模型每回合只能输出两种之一：`<terminate>`，或 `<tool_call>{"tool": "...", "arguments": {...}}</tool_call>`。
//! 终止标记优先；包装只取第一处（非贪婪、跨行）；包装内 JSON 不合法属于可恢复的解析失败，两者都没有则为协议违规。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::tools::ToolCallRequest;

pub const TERMINATE_MARKER: &str = "<terminate>";

/// 解析失败时记录的工具名
pub const PARSE_ERROR_TOOL_NAME: &str = "(parse_error)";

static TOOL_CALL_RE: OnceLock<Regex> = OnceLock::new();

/// 一回合模型输出的解析结果
#[derive(Debug, Clone)]
pub enum ParsedResponse {
    Terminate,
    ToolCall(ToolCallRequest),
    /// 找到包装但内容不是合法的 tool call 对象
    ParseError { raw: String, error: String },
    /// 既没有终止标记也没有包装
    Violation,
}

pub fn parse_response(text: &str) -> ParsedResponse {
    if text.contains(TERMINATE_MARKER) {
        return ParsedResponse::Terminate;
    }

    let re = TOOL_CALL_RE.get_or_init(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").unwrap());
    let Some(inner) = re.captures(text).and_then(|c| c.get(1)) else {
        return ParsedResponse::Violation;
    };
    let raw = inner.as_str().trim().to_string();

    match parse_tool_call(&raw) {
        Ok(request) => ParsedResponse::ToolCall(request),
        Err(error) => ParsedResponse::ParseError { raw, error },
    }
}

/// 包装内 JSON → ToolCallRequest；错误文本形如 `Invalid tool_call JSON: Syntax: ...`
///
/// `tool` 非字符串（如 `{"tool": 7}`）在反序列化阶段失败，记为解析错误而不进入分发。
fn parse_tool_call(raw: &str) -> Result<ToolCallRequest, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| invalid(&e))?;
    if !value.is_object() {
        return Err("Invalid tool_call JSON: Data: expected a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| invalid(&e))
}

fn invalid(e: &serde_json::Error) -> String {
    format!("Invalid tool_call JSON: {:?}: {}", e.classify(), e)
}
