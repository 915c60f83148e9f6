//! 工具层：工具契约、参数 Schema、注册表、执行器、工作目录沙箱，以及各工具提供者
//!
//! 提供者（fs / todo / server / supertest / playwright）各自导出 `tools()`，由 AgentBuilder 显式汇总。

pub mod error;
pub mod executor;
pub mod fs;
pub mod node;
pub mod playwright;
pub mod registry;
pub mod schema;
pub mod server;
pub mod supertest;
pub mod todo;
pub mod workspace;

pub use error::{ToolError, ToolOutput};
pub use executor::{ToolExecutor, MISSING_TOOL_NAME};
pub use registry::{Tool, ToolRegistry};
pub use schema::{tool_call_schema_json, ArgType, ToolArgument, ToolCallRequest, ToolSchema};
pub use workspace::Workspace;

/// 全部内置工具（按提供者顺序）
pub fn builtin_tools() -> Vec<Box<dyn Tool>> {
    let mut tools = Vec::new();
    tools.extend(server::tools());
    tools.extend(supertest::tools());
    tools.extend(playwright::tools());
    tools.extend(fs::tools());
    tools.extend(todo::tools());
    tools
}
