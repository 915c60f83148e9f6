//! 开发服务器工具（npm.*）
//!
//! npm.init 写入 express 工程的 package.json 并安装依赖；start/stop/status 通过 package.json 脚本与 pgrep 管理
//! 后台 nodemon 进程，日志重定向到 `.waa/server.log`。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::{waa_dir, AgentEnvironment};
use crate::tools::node::{find_server_pids, save_package_json, tail_lines, NodeProject};
use crate::tools::{ArgType, Tool, ToolArgument, ToolError, ToolOutput, ToolSchema};

const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 300;
const DEFAULT_LOG_LINES: u64 = 20;

pub fn tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(NpmInitTool::new()),
        Box::new(NpmStartTool::new()),
        Box::new(NpmStopTool::new()),
        Box::new(NpmStatusTool::new()),
        Box::new(NpmLogsTool::new()),
    ]
}

fn server_project(env: &AgentEnvironment) -> NodeProject {
    NodeProject::from_env(env, "server.timeout", DEFAULT_TIMEOUT_SECS)
}

fn default_project() -> NodeProject {
    NodeProject::new(".", DEFAULT_TIMEOUT_SECS)
}

/// express + handlebars + nodemon 工程的 package.json
pub fn server_package_json() -> Map<String, Value> {
    let value = json!({
        "name": "waa-workspace",
        "version": "1.0.0",
        "main": "index.js",
        "scripts": {
            "start": "nodemon index.js > .waa/server.log 2>&1 &",
            "start:sync": "nodemon index.js",
            "stop": "pkill -f 'node.*index.js' || true",
            "logs": "tail -n 20 .waa/server.log",
            "logs:follow": "tail -f .waa/server.log",
            "clean": "rm -rf .waa/server.log",
            "dev": "nodemon index.js",
            "status": "pgrep -f 'node.*index.js' && echo 'Server is running' || echo 'Server is not running'"
        },
        "author": "",
        "license": "ISC",
        "dependencies": {
            "express": "^4.18.2",
            "express-handlebars": "^7.1.2"
        },
        "devDependencies": {
            "nodemon": "^3.0.1"
        }
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct NpmInitTool {
    project: NodeProject,
    install_timeout: Duration,
    schema: ToolSchema,
}

impl NpmInitTool {
    pub fn new() -> Self {
        Self {
            project: default_project(),
            install_timeout: Duration::from_secs(DEFAULT_INSTALL_TIMEOUT_SECS),
            schema: ToolSchema::new(),
        }
    }
}

#[async_trait]
impl Tool for NpmInitTool {
    fn name(&self) -> &str {
        "npm.init"
    }

    fn description(&self) -> &str {
        "`npm.init` - Initialize the node.js express server: writes package.json (express, express-handlebars, nodemon) and runs `npm install`."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = server_project(env);
        self.install_timeout = Duration::from_secs(
            env.get_config_or("server.install_timeout", DEFAULT_INSTALL_TIMEOUT_SECS),
        );
        Ok(())
    }

    async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        save_package_json(&self.project.package_json_path(), &server_package_json())?;
        let output = self
            .project
            .command("npm")
            .arg("install")
            .timeout(self.install_timeout)
            .run()
            .await?;
        let mut data = output.to_json();
        data["message"] = json!("Server initialized");
        Ok(ToolOutput::success(data).into_value())
    }
}

pub struct NpmStartTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl NpmStartTool {
    pub fn new() -> Self {
        Self {
            project: default_project(),
            schema: ToolSchema::new(),
        }
    }
}

#[async_trait]
impl Tool for NpmStartTool {
    fn name(&self) -> &str {
        "npm.start"
    }

    fn description(&self) -> &str {
        "`npm.start` - Start the node.js express server in the background. \
The dev server runs `nodemon`, which restarts the server when the code changes or it crashes. \
Use `npm.status` to check it, `npm.logs` to read its logs, and `npm.stop` when you are done."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = server_project(env);
        Ok(())
    }

    async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        let pids = find_server_pids(self.project.root(), self.project.timeout()).await?;
        if !pids.is_empty() {
            return Err(ToolError::Process(format!(
                "Server is already running with PIDs: {}",
                pids.join(", ")
            )));
        }

        std::fs::create_dir_all(waa_dir(self.project.root()))?;
        let result = self
            .project
            .command("npm")
            .args(["run", "start"])
            .detach_on_timeout()
            .run()
            .await;

        let data = match result {
            Ok(output) => {
                let mut data = output.to_json();
                data["message"] = json!("Server start command executed");
                data
            }
            Err(ToolError::Timeout(_)) => json!({
                "stdout": "",
                "stderr": "",
                "return_code": null,
                "message": "Server started in background (timeout expected)"
            }),
            Err(e) => return Err(e),
        };
        Ok(ToolOutput::success(data).into_value())
    }
}

pub struct NpmStopTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl NpmStopTool {
    pub fn new() -> Self {
        Self {
            project: default_project(),
            schema: ToolSchema::new(),
        }
    }
}

#[async_trait]
impl Tool for NpmStopTool {
    fn name(&self) -> &str {
        "npm.stop"
    }

    fn description(&self) -> &str {
        "`npm.stop` - Stop the running node.js express server (kills node processes running index.js). \
Succeeds silently if no server is running."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = server_project(env);
        Ok(())
    }

    async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        let output = self.project.command("npm").args(["run", "stop"]).run().await?;
        let mut data = output.to_json();
        data["message"] = json!("Server stop command executed");
        Ok(ToolOutput::success(data).into_value())
    }
}

pub struct NpmStatusTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl NpmStatusTool {
    pub fn new() -> Self {
        Self {
            project: default_project(),
            schema: ToolSchema::new(),
        }
    }
}

#[async_trait]
impl Tool for NpmStatusTool {
    fn name(&self) -> &str {
        "npm.status"
    }

    fn description(&self) -> &str {
        "`npm.status` - Check if the node.js express server is running. Returns the process IDs if it is."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = server_project(env);
        Ok(())
    }

    async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        let pids = find_server_pids(self.project.root(), self.project.timeout()).await?;
        let running = !pids.is_empty();
        let message = if running {
            "Server is running"
        } else {
            "Server is not running"
        };
        Ok(
            ToolOutput::success(json!({"running": running, "pids": pids, "message": message}))
                .into_value(),
        )
    }
}

pub struct NpmLogsTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl NpmLogsTool {
    pub fn new() -> Self {
        Self {
            project: default_project(),
            schema: ToolSchema::new().with(ToolArgument::optional(
                "lines",
                "The number of lines to get, default to 20",
                ArgType::Integer,
            )),
        }
    }
}

#[async_trait]
impl Tool for NpmLogsTool {
    fn name(&self) -> &str {
        "npm.logs"
    }

    fn description(&self) -> &str {
        "`npm.logs` - Get the last lines of the server log (.waa/server.log). \
Use the argument `lines` to choose how many, default to 20."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = server_project(env);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let lines = match args.get("lines") {
            None => DEFAULT_LOG_LINES,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| ToolError::InvalidInput("lines must be a non-negative integer".into()))?,
        };
        let path = waa_dir(self.project.root()).join("server.log");
        let logs = tail_lines(&path, lines as usize)?;
        Ok(ToolOutput::success(json!({
            "logs": logs,
            "message": format!("Retrieved last {lines} lines of server logs"),
        }))
        .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_server_package_json_scripts() {
        let pkg = server_package_json();
        assert_eq!(pkg["main"], "index.js");
        assert!(pkg["scripts"]["start"].as_str().unwrap().contains(".waa/server.log"));
        assert_eq!(pkg["devDependencies"]["nodemon"], "^3.0.1");
    }

    #[tokio::test]
    async fn test_logs_tail() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".waa")).unwrap();
        let body: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join(".waa/server.log"), body).unwrap();

        let env = AgentEnvironment::from_json(dir.path(), r#"{"server": {"timeout": 2}}"#).unwrap();
        let mut tool = NpmLogsTool::new();
        tool.initialize(&env).unwrap();

        let out = tool.execute(&Map::new()).await.unwrap();
        let logs = out["data"]["logs"].as_str().unwrap();
        assert_eq!(logs.lines().count(), 20);
        assert!(logs.starts_with("line 11"));

        let args = json!({"lines": 3});
        let out = tool.execute(args.as_object().unwrap()).await.unwrap();
        assert_eq!(out["data"]["logs"], "line 28\nline 29\nline 30");
    }

    #[tokio::test]
    async fn test_logs_missing_file() {
        let dir = TempDir::new().unwrap();
        let env = AgentEnvironment::from_json(dir.path(), "{}").unwrap();
        let mut tool = NpmLogsTool::new();
        tool.initialize(&env).unwrap();
        let err = tool.execute(&Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
