//! 工具执行器
//!
//! 持有只读 ToolRegistry，dispatch(request) 按固定顺序判定：缺工具名 → 未知工具 → 参数非法 → 执行失败/panic → 成功，
//! 任一情况都产出一条 ToolExecutionResult，从不向上抛错；每次调用输出结构化审计日志（JSON）。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::Value;

use crate::memory::ToolExecutionResult;
use crate::tools::{Tool, ToolCallRequest, ToolError, ToolRegistry};

/// 缺少工具名时记录的名称
pub const MISSING_TOOL_NAME: &str = "(missing)";

pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 执行一次工具调用请求；全函数，不会失败
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolExecutionResult {
        let start = Instant::now();
        let arguments = request.arguments.clone();

        let Some(name) = request.tool_name() else {
            return self.audit(
                start,
                ToolExecutionResult::failure(
                    MISSING_TOOL_NAME,
                    arguments,
                    "Missing 'tool' in tool_call",
                ),
                "missing",
            );
        };

        let Some(tool) = self.registry.get(name) else {
            return self.audit(
                start,
                ToolExecutionResult::failure(name, arguments, format!("Unknown tool: {name}")),
                "unknown",
            );
        };

        let Some(args) = arguments.as_object() else {
            return self.audit(
                start,
                ToolExecutionResult::failure(
                    name,
                    arguments.clone(),
                    "Invalid arguments: arguments must be a JSON object",
                ),
                "invalid_args",
            );
        };

        if let Err(e) = tool.schema().validate(args) {
            return self.audit(
                start,
                ToolExecutionResult::failure(name, arguments.clone(), format!("Invalid arguments: {e}")),
                "invalid_args",
            );
        }

        let outcome = AssertUnwindSafe(tool.execute(args))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ToolError::Panic(panic_message(payload))));

        match outcome {
            Ok(value) => self.audit(
                start,
                ToolExecutionResult::success(name, arguments.clone(), value),
                "ok",
            ),
            Err(e) => self.audit(
                start,
                ToolExecutionResult::failure(name, arguments.clone(), e.render()),
                "error",
            ),
        }
    }

    fn audit(&self, start: Instant, result: ToolExecutionResult, outcome: &str) -> ToolExecutionResult {
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": result.tool_name(),
            "ok": !result.is_error(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(result.arguments()),
        });
        tracing::info!(audit = %audit.to_string(), "tool");
        result
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
