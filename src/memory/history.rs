//! 对话历史（History）
//!
//! 只追加的有序日志：SystemPrompt、UserInstruction 在构造时写入前两位，
//! 之后每回合追加 ModelResponse 与（可选的）ToolExecutionResult。条目一经写入不再修改。
//! `project()` 把历史投影为发给 LLM 的消息序列，永不失败。

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;

use crate::memory::{Message, Role};

/// 一次工具调用（或尝试）的结果：result 与 error 二选一
#[derive(Clone, Debug, Serialize)]
pub struct ToolExecutionResult {
    tool_name: String,
    arguments: Value,
    result: Option<Value>,
    error: Option<String>,
    timestamp: DateTime<Local>,
}

impl ToolExecutionResult {
    pub fn success(tool_name: impl Into<String>, arguments: Value, result: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            result: Some(result),
            error: None,
            timestamp: Local::now(),
        }
    }

    pub fn failure(tool_name: impl Into<String>, arguments: Value, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            result: None,
            error: Some(error.into()),
            timestamp: Local::now(),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// 模型看到的文本：`[Tool:<name>] (error) <error>` 或 `[Tool:<name>] <result>`
    pub fn to_text(&self) -> String {
        match (&self.error, &self.result) {
            (Some(err), _) => format!("[Tool:{}] (error) {}", self.tool_name, err),
            (None, Some(result)) => format!("[Tool:{}] {}", self.tool_name, value_to_text(result)),
            (None, None) => format!("[Tool:{}] null", self.tool_name),
        }
    }
}

/// 字符串原样输出，其它值序列化为 JSON；序列化失败时退回 Debug 表示
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}

/// 历史条目
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    SystemPrompt {
        prompt: String,
    },
    UserInstruction {
        instruction: String,
        timestamp: DateTime<Local>,
    },
    ModelResponse {
        response: String,
        timestamp: DateTime<Local>,
    },
    ToolResult(ToolExecutionResult),
}

impl HistoryEntry {
    pub fn role(&self) -> Role {
        match self {
            HistoryEntry::SystemPrompt { .. } => Role::System,
            HistoryEntry::UserInstruction { .. } => Role::User,
            HistoryEntry::ModelResponse { .. } => Role::Assistant,
            HistoryEntry::ToolResult(_) => Role::Tool,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        match self {
            HistoryEntry::SystemPrompt { .. } => None,
            HistoryEntry::UserInstruction { timestamp, .. }
            | HistoryEntry::ModelResponse { timestamp, .. } => Some(*timestamp),
            HistoryEntry::ToolResult(r) => Some(r.timestamp()),
        }
    }

    /// 结构化内容：文本条目为字符串，工具结果为 {tool_name, arguments, result, error}
    pub fn content(&self) -> Value {
        match self {
            HistoryEntry::SystemPrompt { prompt } => Value::String(prompt.clone()),
            HistoryEntry::UserInstruction { instruction, .. } => Value::String(instruction.clone()),
            HistoryEntry::ModelResponse { response, .. } => Value::String(response.clone()),
            HistoryEntry::ToolResult(r) => serde_json::json!({
                "tool_name": r.tool_name,
                "arguments": r.arguments,
                "result": r.result,
                "error": r.error,
            }),
        }
    }

    /// 发给模型的纯文本
    pub fn content_text(&self) -> String {
        match self {
            HistoryEntry::SystemPrompt { prompt } => prompt.clone(),
            HistoryEntry::UserInstruction { instruction, .. } => instruction.clone(),
            HistoryEntry::ModelResponse { response, .. } => response.clone(),
            HistoryEntry::ToolResult(r) => r.to_text(),
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolExecutionResult> {
        match self {
            HistoryEntry::ToolResult(r) => Some(r),
            _ => None,
        }
    }
}

/// 只追加的历史：构造时即写入 SystemPrompt 与 UserInstruction
#[derive(Clone, Debug, Serialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new(system_prompt: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            entries: vec![
                HistoryEntry::SystemPrompt {
                    prompt: system_prompt.into(),
                },
                HistoryEntry::UserInstruction {
                    instruction: instruction.into(),
                    timestamp: Local::now(),
                },
            ],
        }
    }

    /// 追加一回合的模型原始输出
    pub fn append_response(&mut self, response: impl Into<String>) {
        self.entries.push(HistoryEntry::ModelResponse {
            response: response.into(),
            timestamp: Local::now(),
        });
    }

    /// 追加一次工具调用（或失败的尝试）的结果
    pub fn append_tool_result(&mut self, result: ToolExecutionResult) {
        self.entries.push(HistoryEntry::ToolResult(result));
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 构造后至少有两条，恒为 false
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolExecutionResult> {
        self.entries.iter().filter_map(HistoryEntry::as_tool_result)
    }

    /// 投影为模型输入：每条目一条消息，顺序不变
    pub fn project(&self) -> Vec<Message> {
        self.entries
            .iter()
            .map(|entry| Message::new(entry.role(), entry.content_text()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_history() -> History {
        let mut history = History::new("protocol", "create index.html");
        history.append_response(r#"<tool_call>{"tool":"fs.read","arguments":{"path":"a"}}</tool_call>"#);
        history.append_tool_result(ToolExecutionResult::success(
            "fs.read",
            json!({"path": "a"}),
            json!({"ok": true}),
        ));
        history.append_response("<tool_call>{bad</tool_call>");
        history.append_tool_result(ToolExecutionResult::failure(
            "(parse_error)",
            json!({"raw": "{bad"}),
            "Invalid tool_call JSON",
        ));
        history
    }

    #[test]
    fn test_new_history_starts_with_system_then_user() {
        let history = History::new("sys", "task");
        let messages = history.project();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::system("sys"));
        assert_eq!(messages[1], Message::user("task"));
        assert!(!history.is_empty());
    }

    #[test]
    fn test_project_preserves_order_and_count() {
        let history = sample_history();
        let messages = history.project();
        assert_eq!(messages.len(), history.len());
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant, Role::Tool]
        );
    }

    #[test]
    fn test_tool_result_text_forms() {
        let ok = ToolExecutionResult::success("fs.read", json!({}), json!({"ok": true}));
        assert_eq!(ok.to_text(), r#"[Tool:fs.read] {"ok":true}"#);

        let plain = ToolExecutionResult::success("echo", json!({}), json!("hello"));
        assert_eq!(plain.to_text(), "[Tool:echo] hello");

        let err = ToolExecutionResult::failure("fs.delete", json!({}), "Unknown tool: fs.delete");
        assert_eq!(err.to_text(), "[Tool:fs.delete] (error) Unknown tool: fs.delete");
    }

    #[test]
    fn test_success_and_error_are_exclusive() {
        let ok = ToolExecutionResult::success("t", json!({}), json!(1));
        assert!(ok.result().is_some() && ok.error().is_none());
        let err = ToolExecutionResult::failure("t", json!({}), "boom");
        assert!(err.result().is_none() && err.error().is_some());
        assert!(err.is_error());
    }

    #[test]
    fn test_content_shapes() {
        let history = sample_history();
        assert_eq!(history.entries()[0].content(), json!("protocol"));
        assert!(history.entries()[0].timestamp().is_none());
        let tool = history.entries()[3].content();
        assert_eq!(tool["tool_name"], "fs.read");
        assert_eq!(tool["error"], Value::Null);
        assert_eq!(history.tool_results().count(), 2);
    }
}
