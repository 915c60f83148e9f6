//! Node.js 工程辅助：带超时的子进程、package.json 读写、服务进程探测、测试输出摘要
//!
//! npm / npx / pgrep 都通过 tokio::process 执行，超时由调用方配置；测试输出只做正则摘要，不解析报告文件。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::process::Command;

use crate::config::AgentEnvironment;
use crate::tools::ToolError;

/// 开发服务器进程的匹配模式（与 package.json 中 stop/status 脚本一致）
pub const SERVER_PROCESS_PATTERN: &str = "node.*index.js";

/// 工具持有的 Node 工程上下文：工作目录 + 超时
#[derive(Debug, Clone)]
pub struct NodeProject {
    root: PathBuf,
    timeout: Duration,
}

impl NodeProject {
    pub fn new(root: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 超时从配置键读取（秒），缺省用 default_secs
    pub fn from_env(env: &AgentEnvironment, timeout_key: &str, default_secs: u64) -> Self {
        Self::new(env.working_dir(), env.get_config_or(timeout_key, default_secs))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn package_json_path(&self) -> PathBuf {
        self.root.join("package.json")
    }

    pub fn command(&self, program: &str) -> NodeCommand {
        NodeCommand::new(program, &self.root, self.timeout)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "stdout": self.stdout,
            "stderr": self.stderr,
            "return_code": self.return_code,
        })
    }
}

/// 子进程描述；超时默认终止进程
pub struct NodeCommand {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
    timeout: Duration,
    kill_on_timeout: bool,
}

impl NodeCommand {
    pub fn new(program: &str, cwd: &Path, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            timeout,
            kill_on_timeout: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 超时后让进程继续在后台运行
    pub fn detach_on_timeout(mut self) -> Self {
        self.kill_on_timeout = false;
        self
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn run(self) -> Result<CommandOutput, ToolError> {
        let cmdline = self.display();
        tracing::info!(command = %cmdline, cwd = %self.cwd.display(), "node command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.kill_on_timeout);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::Process(format!(
                    "{} not found. Make sure Node.js is installed.",
                    self.program
                ))
            } else {
                ToolError::Process(format!("Failed to run `{cmdline}`: {e}"))
            }
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ToolError::Timeout(format!(
                    "`{cmdline}` timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| ToolError::Process(format!("Failed to run `{cmdline}`: {e}")))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            return_code: output.status.code(),
        })
    }
}

/// 读取 package.json；不存在时返回最小骨架
pub fn load_package_json(path: &Path) -> Result<Map<String, Value>, ToolError> {
    if !path.exists() {
        return Ok(default_package_json());
    }
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(ToolError::InvalidInput(format!(
            "{} is not a JSON object",
            path.display()
        ))),
    }
}

pub fn save_package_json(path: &Path, package: &Map<String, Value>) -> Result<(), ToolError> {
    let text = serde_json::to_string_pretty(package)?;
    std::fs::write(path, text)?;
    Ok(())
}

fn default_package_json() -> Map<String, Value> {
    let value = json!({
        "name": "waa-workspace",
        "version": "1.0.0",
        "main": "index.js",
        "scripts": {},
        "dependencies": {},
        "devDependencies": {}
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// 在 package.json 的某个对象段（scripts / devDependencies）中设置键；段缺失或类型不对时重建
pub fn set_section_entry(package: &mut Map<String, Value>, section: &str, key: &str, value: &str) {
    let entry = package
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(map) = entry {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// 查找开发服务器进程 PID；没有匹配时为空
pub async fn find_server_pids(cwd: &Path, timeout: Duration) -> Result<Vec<String>, ToolError> {
    let output = NodeCommand::new("pgrep", cwd, timeout)
        .args(["-f", SERVER_PROCESS_PATTERN])
        .run()
        .await?;
    if !output.success() {
        return Ok(Vec::new());
    }
    Ok(output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// 读取文件最后 n 行
pub fn tail_lines(path: &Path, n: usize) -> Result<String, ToolError> {
    let text = std::fs::read_to_string(path)
        .map_err(|_| ToolError::NotFound(format!("Log file not found: {}", path.display())))?;
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}

static PASSED_RE: OnceLock<Regex> = OnceLock::new();
static FAILED_RE: OnceLock<Regex> = OnceLock::new();
static PLAYWRIGHT_LINE_RE: OnceLock<Regex> = OnceLock::new();

fn first_count(re: &Regex, line: &str) -> Option<u64> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Jest 汇总行（`Test Suites: 1 failed, 2 passed, 3 total` / `Tests: 1 failed, 5 passed, 6 total`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JestSummary {
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
    /// 通过的测试套件数
    pub suites: u64,
}

pub fn parse_jest_summary(output: &str) -> JestSummary {
    let passed_re = PASSED_RE.get_or_init(|| Regex::new(r"(\d+)\s+passed").unwrap());
    let failed_re = FAILED_RE.get_or_init(|| Regex::new(r"(\d+)\s+failed").unwrap());
    let mut summary = JestSummary::default();
    for line in output.lines().map(str::trim) {
        if line.contains("Test Suites:") {
            if let Some(n) = first_count(passed_re, line) {
                summary.suites = n;
            }
        } else if line.contains("Tests:") {
            if let Some(n) = first_count(passed_re, line) {
                summary.passed = n;
            }
            if let Some(n) = first_count(failed_re, line) {
                summary.failed = n;
            }
        }
    }
    summary.tests = summary.passed + summary.failed;
    summary
}

/// Playwright list reporter 的结尾统计（`5 passed (3.2s)`、`1 failed`、`2 skipped`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaywrightSummary {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

pub fn parse_playwright_summary(output: &str) -> PlaywrightSummary {
    let re = PLAYWRIGHT_LINE_RE
        .get_or_init(|| Regex::new(r"^\s*(\d+)\s+(passed|failed|skipped)\b").unwrap());
    let mut summary = PlaywrightSummary::default();
    for line in output.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let Ok(n) = caps[1].parse::<u64>() else {
            continue;
        };
        match &caps[2] {
            "passed" => summary.passed = n,
            "failed" => summary.failed = n,
            _ => summary.skipped = n,
        }
    }
    summary.total = summary.passed + summary.failed;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_jest_summary() {
        let out = "\
PASS tests/api.test.js
Test Suites: 1 failed, 2 passed, 3 total
Tests:       1 failed, 5 passed, 6 total
Snapshots:   0 total";
        let s = parse_jest_summary(out);
        assert_eq!(
            s,
            JestSummary {
                tests: 6,
                passed: 5,
                failed: 1,
                suites: 2
            }
        );
    }

    #[test]
    fn test_playwright_summary() {
        let out = "Running 4 tests using 1 worker\n  ✓ home (1.2s)\n\n  1 failed\n  2 passed (3.4s)\n  1 skipped\n";
        let s = parse_playwright_summary(out);
        assert_eq!(s.passed, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.skipped, 1);
        assert_eq!(s.total, 3);
    }

    #[test]
    fn test_package_json_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("package.json");
        let mut pkg = load_package_json(&path).unwrap();
        assert_eq!(pkg["name"], "waa-workspace");
        pkg.insert("scripts".into(), Value::String("broken".into()));
        set_section_entry(&mut pkg, "scripts", "test", "jest tests/");
        set_section_entry(&mut pkg, "devDependencies", "jest", "^29.7.0");
        save_package_json(&path, &pkg).unwrap();
        let back = load_package_json(&path).unwrap();
        assert_eq!(back["scripts"]["test"], "jest tests/");
        assert_eq!(back["devDependencies"]["jest"], "^29.7.0");
    }

    #[test]
    fn test_tail_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.log");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();
        assert_eq!(tail_lines(&path, 2).unwrap(), "c\nd");
        assert_eq!(tail_lines(&path, 10).unwrap(), "a\nb\nc\nd");
        assert!(matches!(
            tail_lines(&dir.path().join("missing.log"), 2),
            Err(ToolError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout() {
        let dir = TempDir::new().unwrap();
        let err = NodeCommand::new("sleep", dir.path(), Duration::from_millis(100))
            .arg("5")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_captures_output() {
        let dir = TempDir::new().unwrap();
        let cmd = NodeCommand::new("echo", dir.path(), Duration::from_secs(5)).args(["hello", "waa"]);
        assert_eq!(cmd.display(), "echo hello waa");
        let out = cmd.run().await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello waa");
        assert_eq!(out.return_code, Some(0));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let err = NodeCommand::new("waa-definitely-missing-binary", dir.path(), Duration::from_secs(1))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Process(ref m) if m.contains("not found")));
    }
}
