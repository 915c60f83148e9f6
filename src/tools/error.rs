//! 工具错误与成功结果的统一信封
//!
//! 工具失败返回 ToolError（kind + message），执行器渲染为 `<kind>: <message>` 写入历史；
//! 成功结果统一包成 `{ok, data, error}`。

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Path is protected: {0}")]
    Protected(String),

    #[error("Path is outside working directory: {0}")]
    OutsideWorkspace(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Process(String),

    /// 工具执行时 panic，由执行器捕获
    #[error("{0}")]
    Panic(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidInput(_) => "InvalidInput",
            ToolError::NotFound(_) => "NotFound",
            ToolError::Protected(_) => "Protected",
            ToolError::OutsideWorkspace(_) => "OutsideWorkspace",
            ToolError::Io(_) => "IoError",
            ToolError::Timeout(_) => "Timeout",
            ToolError::Process(_) => "ProcessError",
            ToolError::Panic(_) => "Panic",
        }
    }

    /// 写入历史的错误文本
    pub fn render(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::Io(format!("JSON error: {e}"))
    }
}

/// 成功结果信封：`{"ok": true, "data": ..., "error": null}`
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub ok: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data,
            error: None,
        }
    }

    /// 工具本身执行完成、但业务结果为失败（如测试未全部通过）
    pub fn with_error(data: Value, error: impl Into<String>) -> Self {
        Self {
            ok: true,
            data,
            error: Some(error.into()),
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::json!({
            "ok": self.ok,
            "data": self.data,
            "error": self.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_prefixes_kind() {
        let e = ToolError::NotFound("File not found: a.txt".into());
        assert_eq!(e.render(), "NotFound: File not found: a.txt");
        let e = ToolError::Protected(".waa/config.json".into());
        assert_eq!(e.render(), "Protected: Path is protected: .waa/config.json");
    }

    #[test]
    fn test_envelope_shape() {
        let v = ToolOutput::success(json!({"path": "a"})).into_value();
        assert_eq!(v["ok"], true);
        assert_eq!(v["data"]["path"], "a");
        assert!(v["error"].is_null());
    }
}
