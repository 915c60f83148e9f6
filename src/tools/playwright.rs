//! Playwright UI 测试工具（playwright.*）
//!
//! playwright.init 写入 playwright.config.js（chromium、baseURL localhost:3000），安装依赖与浏览器；
//! playwright.run 执行 `npx playwright test` 并摘要 passed/failed/skipped。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::AgentEnvironment;
use crate::tools::node::{
    load_package_json, parse_playwright_summary, save_package_json, set_section_entry, NodeProject,
};
use crate::tools::{ArgType, Tool, ToolArgument, ToolError, ToolOutput, ToolSchema};

const INIT_TIMEOUT_SECS: u64 = 30;
const RUN_TIMEOUT_SECS: u64 = 60;
const BROWSER_INSTALL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEST_FILE: &str = "tests/ui.test.js";

pub const PLAYWRIGHT_CONFIG: &str = r#"/**
 * Playwright Configuration
 *
 * See https://playwright.dev/docs/test-configuration
 */

const { defineConfig } = require('@playwright/test');

module.exports = defineConfig({
  testDir: './tests',
  testMatch: '**/ui.test.js',
  timeout: 30000,
  retries: 0,
  workers: 1,
  reporter: 'list',

  use: {
    baseURL: 'http://localhost:3000',
    trace: 'on-first-retry',
    screenshot: 'only-on-failure',
    video: 'retain-on-failure',
  },

  projects: [
    {
      name: 'chromium',
      use: { browserName: 'chromium' },
    },
  ],
});
"#;

pub fn tools() -> Vec<Box<dyn Tool>> {
    vec![Box::new(PlaywrightInitTool::new()), Box::new(PlaywrightRunTool::new())]
}

pub struct PlaywrightInitTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl PlaywrightInitTool {
    pub fn new() -> Self {
        Self {
            project: NodeProject::new(".", INIT_TIMEOUT_SECS),
            schema: ToolSchema::new(),
        }
    }
}

#[async_trait]
impl Tool for PlaywrightInitTool {
    fn name(&self) -> &str {
        "playwright.init"
    }

    fn description(&self) -> &str {
        "`playwright.init` - Initialize Playwright for UI testing. \
Creates playwright.config.js, adds @playwright/test and test scripts to package.json, \
runs `npm install` and installs the chromium browser."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = NodeProject::from_env(env, "playwright.timeout", INIT_TIMEOUT_SECS);
        Ok(())
    }

    async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        let config_path = self.project.root().join("playwright.config.js");
        std::fs::write(&config_path, PLAYWRIGHT_CONFIG)?;

        let path = self.project.package_json_path();
        let mut package = load_package_json(&path)?;
        set_section_entry(&mut package, "devDependencies", "@playwright/test", "^1.40.0");
        set_section_entry(&mut package, "scripts", "test:ui", "playwright test tests/ui.test.js");
        set_section_entry(
            &mut package,
            "scripts",
            "test:ui:headed",
            "playwright test tests/ui.test.js --headed",
        );
        set_section_entry(
            &mut package,
            "scripts",
            "test:ui:debug",
            "playwright test tests/ui.test.js --debug",
        );
        save_package_json(&path, &package)?;

        let install = self.project.command("npm").arg("install").run().await?;
        if !install.success() {
            return Err(ToolError::Process(format!("npm install failed: {}", install.stderr)));
        }

        let browsers = self
            .project
            .command("npx")
            .args(["playwright", "install", "chromium"])
            .timeout(Duration::from_secs(BROWSER_INSTALL_TIMEOUT_SECS))
            .run()
            .await?;

        Ok(ToolOutput::success(json!({
            "config_created": config_path.display().to_string(),
            "package_updated": path.display().to_string(),
            "install_stdout": install.stdout,
            "browsers_stdout": browsers.stdout,
            "message": "Playwright initialized successfully",
        }))
        .into_value())
    }
}

pub struct PlaywrightRunTool {
    project: NodeProject,
    schema: ToolSchema,
}

impl PlaywrightRunTool {
    pub fn new() -> Self {
        Self {
            project: NodeProject::new(".", RUN_TIMEOUT_SECS),
            schema: ToolSchema::new()
                .with(ToolArgument::optional(
                    "test_file",
                    "The test file to run, defaults to 'tests/ui.test.js'",
                    ArgType::String,
                ))
                .with(ToolArgument::optional(
                    "headed",
                    "Run browser in headed mode (visible)",
                    ArgType::Boolean,
                )),
        }
    }
}

#[async_trait]
impl Tool for PlaywrightRunTool {
    fn name(&self) -> &str {
        "playwright.run"
    }

    fn description(&self) -> &str {
        "`playwright.run` - Run Playwright UI tests. The server must be running on port 3000. \
Optionally pass test_file (defaults to 'tests/ui.test.js') and headed. \
Returns pass/fail status, a test summary and the raw output."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), ToolError> {
        self.project = NodeProject::from_env(env, "playwright.timeout", RUN_TIMEOUT_SECS);
        Ok(())
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let test_file = args
            .get("test_file")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TEST_FILE);
        let headed = args.get("headed").and_then(Value::as_bool).unwrap_or(false);

        let mut cmd = self
            .project
            .command("npx")
            .args(["playwright", "test", test_file]);
        if headed {
            cmd = cmd.arg("--headed");
        }
        let output = cmd.run().await.map_err(|e| match e {
            ToolError::Timeout(_) => ToolError::Timeout(format!(
                "Playwright tests timed out after {} seconds",
                self.project.timeout().as_secs()
            )),
            other => other,
        })?;

        let summary = parse_playwright_summary(&output.stdout);
        let passed = output.success();
        let data = json!({
            "passed": passed,
            "return_code": output.return_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
            "summary": summary,
            "test_file": test_file,
            "message": if passed { "UI tests passed" } else { "UI tests failed" },
        });
        let out = if passed {
            ToolOutput::success(data)
        } else {
            ToolOutput::with_error(data, "Some UI tests failed")
        };
        Ok(out.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_targets_local_server() {
        assert!(PLAYWRIGHT_CONFIG.contains("baseURL: 'http://localhost:3000'"));
        assert!(PLAYWRIGHT_CONFIG.contains("browserName: 'chromium'"));
    }

    #[test]
    fn test_timeouts_from_config() {
        let dir = TempDir::new().unwrap();
        let env =
            AgentEnvironment::from_json(dir.path(), r#"{"playwright": {"timeout": 120}}"#).unwrap();
        let mut run = PlaywrightRunTool::new();
        assert_eq!(run.project.timeout(), Duration::from_secs(60));
        run.initialize(&env).unwrap();
        assert_eq!(run.project.timeout(), Duration::from_secs(120));
        assert_eq!(run.project.root(), dir.path());
    }
}
