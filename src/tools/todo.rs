//! TODO 工具（todo.*）
//!
//! 任务列表存放在 `.waa/todo.json`（JSON 数组）。文件不存在或损坏时按空列表处理。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::{waa_dir, AgentEnvironment};
use crate::tools::{ArgType, Tool, ToolArgument, ToolError, ToolOutput, ToolSchema};

pub fn tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(TodoAddTool::new()),
        Box::new(TodoListTool::new()),
        Box::new(TodoCompleteTool::new()),
        Box::new(TodoRemoveTool::new()),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub description: String,
    pub status: TodoStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// `.waa/todo.json` 读写
#[derive(Debug, Clone)]
pub struct TodoStore {
    path: PathBuf,
}

impl Default for TodoStore {
    fn default() -> Self {
        Self::new(Path::new("."))
    }
}

impl TodoStore {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            path: waa_dir(working_dir).join("todo.json"),
        }
    }

    pub fn load(&self) -> Vec<TodoItem> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, todos: &[TodoItem]) -> Result<(), ToolError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(todos)?)?;
        Ok(())
    }
}

fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn id_arg(args: &Map<String, Value>) -> Result<u64, ToolError> {
    args.get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| ToolError::InvalidInput("id must be a non-negative integer".to_string()))
}

pub struct TodoAddTool {
    store: TodoStore,
    schema: ToolSchema,
}

impl TodoAddTool {
    pub fn new() -> Self {
        Self {
            store: TodoStore::default(),
            schema: ToolSchema::new().with(ToolArgument::required(
                "description",
                "Todo description",
                ArgType::String,
            )),
        }
    }
}

#[async_trait]
impl Tool for TodoAddTool {
    fn name(&self) -> &str {
        "todo.add"
    }

    fn description(&self) -> &str {
        "`todo.add` - Add a new TODO item. Args: description (str)."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.store = TodoStore::new(env.working_dir());
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let description = args
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if description.is_empty() {
            return Err(ToolError::InvalidInput(
                "description must be a non-empty string".to_string(),
            ));
        }
        let mut todos = self.store.load();
        let id = todos.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        todos.push(TodoItem {
            id,
            description: description.to_string(),
            status: TodoStatus::Pending,
            created_at: now_iso(),
            completed_at: None,
        });
        self.store.save(&todos)?;
        Ok(ToolOutput::success(json!({"id": id})).into_value())
    }
}

pub struct TodoListTool {
    store: TodoStore,
    schema: ToolSchema,
}

impl TodoListTool {
    pub fn new() -> Self {
        Self {
            store: TodoStore::default(),
            schema: ToolSchema::new().with(ToolArgument::optional(
                "status",
                "Filter by status: pending, completed or all",
                ArgType::String,
            )),
        }
    }
}

#[async_trait]
impl Tool for TodoListTool {
    fn name(&self) -> &str {
        "todo.list"
    }

    fn description(&self) -> &str {
        "`todo.list` - List TODO items. Optional arg: status ('pending'|'completed'|'all'; default 'all')."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.store = TodoStore::new(env.working_dir());
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let status = args
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("all")
            .to_lowercase();
        let filter = match status.as_str() {
            "all" => None,
            "pending" => Some(TodoStatus::Pending),
            "completed" => Some(TodoStatus::Completed),
            _ => {
                return Err(ToolError::InvalidInput(
                    "status must be 'pending', 'completed', or 'all'".to_string(),
                ))
            }
        };
        let todos: Vec<TodoItem> = self
            .store
            .load()
            .into_iter()
            .filter(|t| filter.as_ref().map_or(true, |s| &t.status == s))
            .collect();
        Ok(ToolOutput::success(json!({"count": todos.len(), "todos": todos})).into_value())
    }
}

pub struct TodoCompleteTool {
    store: TodoStore,
    schema: ToolSchema,
}

impl TodoCompleteTool {
    pub fn new() -> Self {
        Self {
            store: TodoStore::default(),
            schema: ToolSchema::new().with(ToolArgument::required(
                "id",
                "Todo id to complete",
                ArgType::Integer,
            )),
        }
    }
}

#[async_trait]
impl Tool for TodoCompleteTool {
    fn name(&self) -> &str {
        "todo.complete"
    }

    fn description(&self) -> &str {
        "`todo.complete` - Mark a TODO as completed. Args: id (int)."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.store = TodoStore::new(env.working_dir());
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let id = id_arg(args)?;
        let mut todos = self.store.load();
        let item = todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ToolError::NotFound(format!("Todo id {id} not found")))?;
        item.status = TodoStatus::Completed;
        item.completed_at = Some(now_iso());
        self.store.save(&todos)?;
        Ok(ToolOutput::success(json!({"id": id})).into_value())
    }
}

pub struct TodoRemoveTool {
    store: TodoStore,
    schema: ToolSchema,
}

impl TodoRemoveTool {
    pub fn new() -> Self {
        Self {
            store: TodoStore::default(),
            schema: ToolSchema::new().with(ToolArgument::required(
                "id",
                "Todo id to remove",
                ArgType::Integer,
            )),
        }
    }
}

#[async_trait]
impl Tool for TodoRemoveTool {
    fn name(&self) -> &str {
        "todo.remove"
    }

    fn description(&self) -> &str {
        "`todo.remove` - Remove a TODO item. Args: id (int)."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.store = TodoStore::new(env.working_dir());
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let id = id_arg(args)?;
        let mut todos = self.store.load();
        let before = todos.len();
        todos.retain(|t| t.id != id);
        if todos.len() == before {
            return Err(ToolError::NotFound(format!("Todo id {id} not found")));
        }
        self.store.save(&todos)?;
        Ok(ToolOutput::success(json!({"removed_id": id})).into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Vec<Box<dyn Tool>>) {
        let dir = TempDir::new().unwrap();
        let env = AgentEnvironment::from_json(dir.path(), "{}").unwrap();
        let mut tools = tools();
        for tool in tools.iter_mut() {
            tool.initialize(&env).unwrap();
        }
        (dir, tools)
    }

    async fn call(tools: &[Box<dyn Tool>], name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = tools.iter().find(|t| t.name() == name).unwrap();
        tool.execute(args.as_object().unwrap()).await
    }

    #[tokio::test]
    async fn test_todo_lifecycle() {
        let (dir, tools) = setup();
        let a = call(&tools, "todo.add", json!({"description": "write index.html"})).await.unwrap();
        let b = call(&tools, "todo.add", json!({"description": "start server"})).await.unwrap();
        assert_eq!(a["data"]["id"], 1);
        assert_eq!(b["data"]["id"], 2);
        assert!(dir.path().join(".waa/todo.json").is_file());

        call(&tools, "todo.complete", json!({"id": 1})).await.unwrap();
        call(&tools, "todo.complete", json!({"id": 1})).await.unwrap();

        let pending = call(&tools, "todo.list", json!({"status": "PENDING"})).await.unwrap();
        assert_eq!(pending["data"]["count"], 1);
        assert_eq!(pending["data"]["todos"][0]["description"], "start server");

        let done = call(&tools, "todo.list", json!({"status": "completed"})).await.unwrap();
        assert!(done["data"]["todos"][0]["completed_at"].is_string());

        let removed = call(&tools, "todo.remove", json!({"id": 2})).await.unwrap();
        assert_eq!(removed["data"]["removed_id"], 2);
        let all = call(&tools, "todo.list", json!({})).await.unwrap();
        assert_eq!(all["data"]["count"], 1);
    }

    #[tokio::test]
    async fn test_todo_errors() {
        let (dir, tools) = setup();
        let err = call(&tools, "todo.add", json!({"description": "   "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
        let err = call(&tools, "todo.remove", json!({"id": 9})).await.unwrap_err();
        assert_eq!(err.render(), "NotFound: Todo id 9 not found");
        let err = call(&tools, "todo.list", json!({"status": "later"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        std::fs::create_dir_all(dir.path().join(".waa")).unwrap();
        std::fs::write(dir.path().join(".waa/todo.json"), "{not json").unwrap();
        let all = call(&tools, "todo.list", json!({})).await.unwrap();
        assert_eq!(all["data"]["count"], 0);
    }
}
