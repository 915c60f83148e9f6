//! 文件系统工具（fs.*）
//!
//! 全部路径经 Workspace 解析，必须位于工作目录内；写入、删除、编辑拒绝 protected_files。
//! 成功结果统一为 `{ok: true, data, error: null}`，失败返回 ToolError。

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::AgentEnvironment;
use crate::tools::{ArgType, Tool, ToolArgument, ToolError, ToolOutput, ToolSchema, Workspace};

/// fs.* 全部工具
pub fn tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(FsWriteTool::new()),
        Box::new(FsDeleteTool::new()),
        Box::new(FsReadTool::new()),
        Box::new(FsEditTool::new()),
        Box::new(FsMkdirTool::new()),
        Box::new(FsRmdirTool::new()),
        Box::new(FsLsTool::new()),
        Box::new(FsTreeTool::new()),
    ]
}

fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn ok(data: Value) -> Result<Value, ToolError> {
    Ok(ToolOutput::success(data).into_value())
}

/// fs.write：创建或覆盖文件，自动创建父目录
pub struct FsWriteTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsWriteTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new()
                .with(ToolArgument::required("path", "File path to write", ArgType::String))
                .with(ToolArgument::required("content", "Content to write", ArgType::String)),
        }
    }
}

#[async_trait]
impl Tool for FsWriteTool {
    fn name(&self) -> &str {
        "fs.write"
    }

    fn description(&self) -> &str {
        "`fs.write` - Create or overwrite file (auto-create parents). Block writes to protected_files."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = str_arg(args, "path");
        let content = str_arg(args, "content");
        let abs = self.workspace.resolve_writable(rel)?;
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&abs, content).await?;
        ok(json!({"path": rel, "bytes": content.len()}))
    }
}

/// fs.delete：删除单个文件
pub struct FsDeleteTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsDeleteTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new()
                .with(ToolArgument::required("path", "File path to delete", ArgType::String)),
        }
    }
}

#[async_trait]
impl Tool for FsDeleteTool {
    fn name(&self) -> &str {
        "fs.delete"
    }

    fn description(&self) -> &str {
        "`fs.delete` - Delete a file. Block deletes to protected_files."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = str_arg(args, "path");
        let abs = self.workspace.resolve_writable(rel)?;
        if !abs.is_file() {
            return Err(ToolError::NotFound(format!("File not found: {rel}")));
        }
        tokio::fs::remove_file(&abs).await?;
        ok(json!({"deleted": rel}))
    }
}

/// fs.read：读取文本文件
pub struct FsReadTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsReadTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new()
                .with(ToolArgument::required("path", "File path to read", ArgType::String)),
        }
    }
}

/// 非空且不以换行结尾时最后一行也计数
fn line_count(content: &str) -> usize {
    let newlines = content.matches('\n').count();
    if content.is_empty() || content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

#[async_trait]
impl Tool for FsReadTool {
    fn name(&self) -> &str {
        "fs.read"
    }

    fn description(&self) -> &str {
        "`fs.read` - Read a file; returns content, size, line_count."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = str_arg(args, "path");
        let abs = self.workspace.resolve(rel)?;
        if !abs.is_file() {
            return Err(ToolError::NotFound(format!("File not found: {rel}")));
        }
        let content = tokio::fs::read_to_string(&abs).await?;
        ok(json!({
            "path": rel,
            "size": content.len(),
            "line_count": line_count(&content),
            "content": content,
        }))
    }
}

/// fs.edit：替换第一处 old_text
pub struct FsEditTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsEditTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new()
                .with(ToolArgument::required("path", "File path to edit", ArgType::String))
                .with(ToolArgument::required(
                    "old_text",
                    "Text to find (first occurrence)",
                    ArgType::String,
                ))
                .with(ToolArgument::required("new_text", "Replacement text", ArgType::String)),
        }
    }
}

#[async_trait]
impl Tool for FsEditTool {
    fn name(&self) -> &str {
        "fs.edit"
    }

    fn description(&self) -> &str {
        "`fs.edit` - Replace first occurrence of old_text with new_text. Block edits to protected_files."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = str_arg(args, "path");
        let old_text = str_arg(args, "old_text");
        let new_text = str_arg(args, "new_text");
        let abs = self.workspace.resolve_writable(rel)?;
        if !abs.is_file() {
            return Err(ToolError::NotFound(format!("File not found: {rel}")));
        }
        let content = tokio::fs::read_to_string(&abs).await?;
        if !content.contains(old_text) {
            return Err(ToolError::NotFound(format!("old_text not found in {rel}")));
        }
        let updated = content.replacen(old_text, new_text, 1);
        tokio::fs::write(&abs, updated).await?;
        ok(json!({"replacements": 1, "path": rel}))
    }
}

/// fs.mkdir：递归创建目录
pub struct FsMkdirTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsMkdirTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new().with(ToolArgument::required(
                "path",
                "Directory path to create",
                ArgType::String,
            )),
        }
    }
}

#[async_trait]
impl Tool for FsMkdirTool {
    fn name(&self) -> &str {
        "fs.mkdir"
    }

    fn description(&self) -> &str {
        "`fs.mkdir` - Create a directory (parents=True)."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = str_arg(args, "path");
        let abs = self.workspace.resolve(rel)?;
        tokio::fs::create_dir_all(&abs).await?;
        ok(json!({"created": rel}))
    }
}

/// fs.rmdir：删除目录，recursive=true 时可删除非空目录
pub struct FsRmdirTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsRmdirTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new()
                .with(ToolArgument::required("path", "Directory path to remove", ArgType::String))
                .with(ToolArgument::optional("recursive", "Remove recursively", ArgType::Boolean)),
        }
    }
}

#[async_trait]
impl Tool for FsRmdirTool {
    fn name(&self) -> &str {
        "fs.rmdir"
    }

    fn description(&self) -> &str {
        "`fs.rmdir` - Remove a directory. If recursive=true, removes non-empty directories."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = str_arg(args, "path");
        let recursive = args.get("recursive").and_then(Value::as_bool).unwrap_or(false);
        let abs = self.workspace.resolve(rel)?;
        if !abs.is_dir() {
            return Err(ToolError::NotFound(format!("Directory not found: {rel}")));
        }
        if abs == self.workspace.root() {
            return Err(ToolError::InvalidInput(
                "Refusing to remove the working directory".to_string(),
            ));
        }
        if self.workspace.is_protected(&abs) || self.workspace.contains_protected(&abs) {
            return Err(ToolError::Protected(rel.to_string()));
        }
        if recursive {
            tokio::fs::remove_dir_all(&abs).await?;
        } else {
            tokio::fs::remove_dir(&abs).await?;
        }
        ok(json!({"removed": rel, "recursive": recursive}))
    }
}

/// fs.ls：列出目录项（按名称排序）
pub struct FsLsTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsLsTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new()
                .with(ToolArgument::optional("path", "Directory to list", ArgType::String)),
        }
    }
}

#[async_trait]
impl Tool for FsLsTool {
    fn name(&self) -> &str {
        "fs.ls"
    }

    fn description(&self) -> &str {
        "`fs.ls` - List directory entries with name, type, size."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let abs = self.workspace.resolve(rel)?;
        if !abs.is_dir() {
            return Err(ToolError::NotFound(format!("Directory not found: {rel}")));
        }
        let mut entries = Vec::new();
        let mut read = tokio::fs::read_dir(&abs).await?;
        while let Some(entry) = read.next_entry().await? {
            let meta = entry.metadata().await?;
            entries.push((
                entry.file_name().to_string_lossy().into_owned(),
                meta.is_dir(),
                if meta.is_file() { meta.len() } else { 0 },
            ));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let entries: Vec<Value> = entries
            .into_iter()
            .map(|(name, is_dir, size)| {
                json!({"name": name, "type": if is_dir { "dir" } else { "file" }, "size": size})
            })
            .collect();
        ok(json!({"path": rel, "entries": entries}))
    }
}

/// fs.tree：递归目录树，深度从 1 开始
pub struct FsTreeTool {
    workspace: Workspace,
    schema: ToolSchema,
}

impl FsTreeTool {
    pub fn new() -> Self {
        Self {
            workspace: Workspace::default(),
            schema: ToolSchema::new()
                .with(ToolArgument::optional("path", "Root directory to tree", ArgType::String))
                .with(ToolArgument::optional(
                    "max_depth",
                    "Max depth to traverse",
                    ArgType::Integer,
                )),
        }
    }
}

/// 读不了的目录返回空列表；符号链接只列出、不跟随
fn build_tree(dir: &Path, depth: i64, max_depth: i64) -> Vec<Value> {
    if depth > max_depth {
        return Vec::new();
    }
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut children: Vec<_> = read.filter_map(Result::ok).collect();
    children.sort_by_key(|e| e.file_name());
    children
        .into_iter()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().ok()?;
            let node = if file_type.is_symlink() {
                json!({"name": name, "type": "symlink"})
            } else if file_type.is_dir() {
                json!({"name": name, "type": "dir", "children": build_tree(&entry.path(), depth + 1, max_depth)})
            } else {
                let size = entry.metadata().ok().map(|m| m.len());
                json!({"name": name, "type": "file", "size": size})
            };
            Some(node)
        })
        .collect()
}

#[async_trait]
impl Tool for FsTreeTool {
    fn name(&self) -> &str {
        "fs.tree"
    }

    fn description(&self) -> &str {
        "`fs.tree` - Show directory tree structure up to max_depth."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.workspace = Workspace::from_env(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let rel = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let max_depth = args.get("max_depth").and_then(Value::as_i64).unwrap_or(2);
        let abs = self.workspace.resolve(rel)?;
        if !abs.is_dir() {
            return Err(ToolError::NotFound(format!("Directory not found: {rel}")));
        }
        let tree = tokio::task::spawn_blocking(move || build_tree(&abs, 1, max_depth))
            .await
            .map_err(|e| ToolError::Io(format!("Failed to walk directory: {e}")))?;
        ok(json!({"path": rel, "tree": tree}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(protected: &str) -> (TempDir, Vec<Box<dyn Tool>>) {
        let dir = TempDir::new().unwrap();
        let env = AgentEnvironment::from_json(
            dir.path(),
            &format!(r#"{{"protected_files": [{protected}]}}"#),
        )
        .unwrap();
        let mut tools = tools();
        for tool in tools.iter_mut() {
            tool.initialize(&env).unwrap();
        }
        (dir, tools)
    }

    fn tool<'a>(tools: &'a [Box<dyn Tool>], name: &str) -> &'a dyn Tool {
        tools.iter().find(|t| t.name() == name).unwrap().as_ref()
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_write_read_edit_delete() {
        let (dir, tools) = setup("");
        let out = tool(&tools, "fs.write")
            .execute(&args(json!({"path": "site/index.html", "content": "<h1>Old</h1>\n"})))
            .await
            .unwrap();
        assert_eq!(out["ok"], true);
        assert_eq!(out["data"]["bytes"], 13);
        assert!(dir.path().join("site/index.html").is_file());

        tool(&tools, "fs.edit")
            .execute(&args(json!({"path": "site/index.html", "old_text": "Old", "new_text": "New"})))
            .await
            .unwrap();

        let read = tool(&tools, "fs.read")
            .execute(&args(json!({"path": "site/index.html"})))
            .await
            .unwrap();
        assert_eq!(read["data"]["content"], "<h1>New</h1>\n");
        assert_eq!(read["data"]["line_count"], 1);

        let err = tool(&tools, "fs.edit")
            .execute(&args(json!({"path": "site/index.html", "old_text": "Missing", "new_text": ""})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));

        tool(&tools, "fs.delete")
            .execute(&args(json!({"path": "site/index.html"})))
            .await
            .unwrap();
        let err = tool(&tools, "fs.delete")
            .execute(&args(json!({"path": "site/index.html"})))
            .await
            .unwrap_err();
        assert_eq!(err.render(), "NotFound: File not found: site/index.html");
    }

    #[tokio::test]
    async fn test_protected_and_outside_paths() {
        let (dir, tools) = setup(r#"".waa""#);
        std::fs::create_dir_all(dir.path().join(".waa")).unwrap();
        std::fs::write(dir.path().join(".waa/instruction.md"), "task").unwrap();

        let err = tool(&tools, "fs.write")
            .execute(&args(json!({"path": ".waa/instruction.md", "content": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Protected(_)));

        let err = tool(&tools, "fs.rmdir")
            .execute(&args(json!({"path": ".waa", "recursive": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Protected(_)));

        let read = tool(&tools, "fs.read")
            .execute(&args(json!({"path": ".waa/instruction.md"})))
            .await
            .unwrap();
        assert_eq!(read["data"]["content"], "task");

        let err = tool(&tools, "fs.read")
            .execute(&args(json!({"path": "../../etc/passwd"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::OutsideWorkspace(_)));
    }

    #[tokio::test]
    async fn test_mkdir_ls_tree_rmdir() {
        let (dir, tools) = setup("");
        tool(&tools, "fs.mkdir")
            .execute(&args(json!({"path": "assets/images/icons"})))
            .await
            .unwrap();
        std::fs::write(dir.path().join("assets/app.css"), "body{}").unwrap();

        let ls = tool(&tools, "fs.ls")
            .execute(&args(json!({"path": "assets"})))
            .await
            .unwrap();
        let entries = ls["data"]["entries"].as_array().unwrap();
        assert_eq!(entries[0]["name"], "app.css");
        assert_eq!(entries[0]["type"], "file");
        assert_eq!(entries[0]["size"], 6);
        assert_eq!(entries[1]["type"], "dir");

        let tree = tool(&tools, "fs.tree")
            .execute(&args(json!({"max_depth": 2})))
            .await
            .unwrap();
        let assets = &tree["data"]["tree"][0];
        assert_eq!(assets["name"], "assets");
        let images = &assets["children"][1];
        assert_eq!(images["name"], "images");
        assert_eq!(images["children"], json!([]));

        let err = tool(&tools, "fs.rmdir")
            .execute(&args(json!({"path": "assets"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "IoError");
        tool(&tools, "fs.rmdir")
            .execute(&args(json!({"path": "assets", "recursive": true})))
            .await
            .unwrap();
        assert!(!dir.path().join("assets").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tree_does_not_follow_symlinks() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        let (dir, tools) = setup("");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let tree = tool(&tools, "fs.tree")
            .execute(&args(json!({})))
            .await
            .unwrap();
        assert_eq!(tree["data"]["tree"], json!([{"name": "link", "type": "symlink"}]));
        assert!(!tree.to_string().contains("secret.txt"));

        let err = tool(&tools, "fs.ls")
            .execute(&args(json!({"path": "link"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::OutsideWorkspace(_)));
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\nb\n"), 2);
        assert_eq!(line_count("a\nb"), 2);
    }
}
