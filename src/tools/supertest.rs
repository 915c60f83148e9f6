//! Jest + Supertest API 测试工具（supertest.*）

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::AgentEnvironment;
use crate::tools::node::{
    load_package_json, parse_jest_summary, save_package_json, set_section_entry, NodeProject,
};
use crate::tools::{ArgType, Tool, ToolArgument, ToolError, ToolOutput, ToolSchema};

const INIT_TIMEOUT_SECS: u64 = 30;
const RUN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEST_FILE: &str = "tests/api.test.js";

pub fn tools() -> Vec<Box<dyn Tool>> {
    vec![Box::new(SupertestInitTool::new()), Box::new(SupertestRunTool::new())]
}

pub struct SupertestInitTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl SupertestInitTool {
    pub fn new() -> Self {
        Self {
            project: NodeProject::new(".", INIT_TIMEOUT_SECS),
            schema: ToolSchema::new(),
        }
    }
}

#[async_trait]
impl Tool for SupertestInitTool {
    fn name(&self) -> &str {
        "supertest.init"
    }

    fn description(&self) -> &str {
        "`supertest.init` - Initialize Jest and Supertest for API testing. \
Adds jest and supertest to devDependencies, adds test scripts to package.json and runs `npm install`."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = NodeProject::from_env(env, "supertest.timeout", INIT_TIMEOUT_SECS);
        Ok(())
    }

    async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        let path = self.project.package_json_path();
        let mut package = load_package_json(&path)?;
        set_section_entry(&mut package, "devDependencies", "jest", "^29.7.0");
        set_section_entry(&mut package, "devDependencies", "supertest", "^6.3.3");
        set_section_entry(&mut package, "scripts", "test", "jest tests/");
        set_section_entry(&mut package, "scripts", "test:api", "jest tests/api.test.js");
        set_section_entry(&mut package, "scripts", "test:watch", "jest tests/ --watch");
        set_section_entry(&mut package, "scripts", "test:coverage", "jest tests/ --coverage");
        save_package_json(&path, &package)?;

        let install = self.project.command("npm").arg("install").run().await?;
        if !install.success() {
            return Err(ToolError::Process(format!("npm install failed: {}", install.stderr)));
        }

        Ok(ToolOutput::success(json!({
            "package_updated": path.display().to_string(),
            "install_stdout": install.stdout,
            "message": "Jest and Supertest initialized successfully",
        }))
        .into_value())
    }
}

pub struct SupertestRunTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl SupertestRunTool {
    pub fn new() -> Self {
        Self {
            project: NodeProject::new(".", RUN_TIMEOUT_SECS),
            schema: ToolSchema::new()
                .with(ToolArgument::optional(
                    "test_file",
                    "The test file to run, defaults to 'tests/api.test.js'",
                    ArgType::String,
                ))
                .with(ToolArgument::optional("verbose", "Run tests in verbose mode", ArgType::Boolean)),
        }
    }
}

#[async_trait]
impl Tool for SupertestRunTool {
    fn name(&self) -> &str {
        "supertest.run"
    }

    fn description(&self) -> &str {
        "`supertest.run` - Run Jest/Supertest API tests (`npm test -- <test_file>`). \
Optionally pass test_file (defaults to 'tests/api.test.js') and verbose. \
Returns pass/fail status, a test summary and the raw output."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = NodeProject::from_env(env, "supertest.timeout", RUN_TIMEOUT_SECS);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let test_file = args
            .get("test_file")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TEST_FILE);
        let verbose = args.get("verbose").and_then(Value::as_bool).unwrap_or(false);

        let mut cmd = self.project.command("npm").args(["test", "--", test_file]);
        if verbose {
            cmd = cmd.arg("--verbose");
        }
        let output = cmd.run().await.map_err(|e| match e {
            ToolError::Timeout(_) => ToolError::Timeout(format!(
                "Jest tests timed out after {} seconds",
                self.project.timeout().as_secs()
            )),
            other => other,
        })?;

        // Jest 把汇总写到 stderr
        let summary = parse_jest_summary(&format!("{}\n{}", output.stdout, output.stderr));
        let passed = output.success();
        let data = json!({
            "passed": passed,
            "return_code": output.return_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
            "summary": summary,
            "test_file": test_file,
            "message": if passed { "API tests passed" } else { "API tests failed" },
        });
        let out = if passed {
            ToolOutput::success(data)
        } else {
            ToolOutput::with_error(data, "Some API tests failed")
        };
        Ok(out.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_timeouts_from_config() {
        let dir = TempDir::new().unwrap();
        let env = AgentEnvironment::from_json(dir.path(), "{}").unwrap();
        let mut init = SupertestInitTool::new();
        let mut run = SupertestRunTool::new();
        init.initialize(&env).unwrap();
        run.initialize(&env).unwrap();
        assert_eq!(init.project.timeout(), Duration::from_secs(30));
        assert_eq!(run.project.timeout(), Duration::from_secs(60));

        let env = AgentEnvironment::from_json(dir.path(), r#"{"supertest": {"timeout": 90}}"#).unwrap();
        run.initialize(&env).unwrap();
        assert_eq!(run.project.timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_schema_accepts_optional_args() {
        let tool = SupertestRunTool::new();
        let args = json!({"test_file": "tests/x.test.js", "verbose": true});
        assert!(tool.schema().validate(args.as_object().unwrap()).is_ok());
        let bad = json!({"verbose": "yes"});
        assert_eq!(
            tool.schema().validate(bad.as_object().unwrap()).unwrap_err(),
            "Argument verbose is invalid"
        );
    }
}
