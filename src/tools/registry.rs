//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / schema / initialize / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时校验参数、捕获 panic 并统一转为 ToolExecutionResult。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::AgentEnvironment;
use crate::tools::{ToolError, ToolSchema};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、一次性初始化、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    fn schema(&self) -> &ToolSchema;

    /// 注册前调用一次，读取工作目录与配置；失败只记录，工具仍会注册
    fn initialize(&mut self, _env: &AgentEnvironment) -> Result<(), ToolError> {
        Ok(())
    }

    /// 执行工具；args 已通过 schema 校验
    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，构建完成后只读
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名后注册者覆盖前者；返回被覆盖的旧工具
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::from(tool))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 已注册工具的 schema JSON（名称、描述、参数），用于 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.schema().to_json_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed {
        name: &'static str,
        reply: &'static str,
        schema: ToolSchema,
    }

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fixed reply"
        }
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }
        async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
            Ok(json!(self.reply))
        }
    }

    fn fixed(name: &'static str, reply: &'static str) -> Box<dyn Tool> {
        Box::new(Fixed {
            name,
            reply,
            schema: ToolSchema::new(),
        })
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let mut reg = ToolRegistry::new();
        assert!(reg.register(fixed("t", "first")).is_none());
        assert!(reg.register(fixed("t", "second")).is_some());
        assert_eq!(reg.len(), 1);
        let out = reg.get("t").unwrap().execute(&Map::new()).await.unwrap();
        assert_eq!(out, json!("second"));
    }

    #[test]
    fn test_names_sorted_and_schema_json() {
        let mut reg = ToolRegistry::new();
        reg.register(fixed("b", ""));
        reg.register(fixed("a", ""));
        assert_eq!(reg.tool_names(), vec!["a".to_string(), "b".to_string()]);
        let v: Value = serde_json::from_str(&reg.to_schema_json()).unwrap();
        assert_eq!(v[0]["name"], "a");
        assert_eq!(v[0]["parameters"]["type"], "object");
        assert!(!reg.contains("c"));
    }
}
