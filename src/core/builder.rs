//! Agent 构建器：工具注册表与系统提示词的统一组装
//!
//! 候选工具来自显式的提供者列表；逐个按 allow-list 过滤、initialize（失败只记录，仍注册）、按名注册（后者覆盖前者）。

use crate::config::AgentEnvironment;
use crate::observability::RunLog;
use crate::tools::{builtin_tools, tool_call_schema_json, Tool, ToolRegistry};

/// 固定的协议说明（系统提示词正文）
pub const SYSTEM_PROMPT: &str = r#"You are WAA (Web-App Agent). Follow this protocol EXACTLY.

# OUTPUT MODE (Hard Rules)
- On every turn, you MUST output **only one** of the following:
  1) <tool_call>{"tool":"TOOL_NAME","arguments":{...}}</tool_call>
  2) <terminate>
- Output nothing else. No prose, no markdown, no comments.
- The JSON inside <tool_call> MUST be valid: double quotes only, no trailing commas.
- If a step needs multiple actions, split them across multiple turns (one tool call per turn).

# SAFETY & FILE RULES
- All paths must be inside the working directory; never use path traversal (e.g., "../").
- Do not modify or delete protected files (the environment provides that list).
- If an action would violate these rules, choose a safe alternative (e.g., read instead of write, or skip).

# TOOL USAGE
- Use only tools that are permitted in this run (listed under AVAILABLE TOOLS).
- Prefer small, incremental edits: fs.read → fs.edit/fs.write, and verify as needed.
- Use server/test tools only if they are available and relevant.

# STRATEGY
- Derive requirements strictly from the user instruction in history.
- Take concrete steps toward completion. Keep changes minimal but functional.
- Stop with <terminate> once the task is complete (and tests pass if applicable).

# EXAMPLES (format only; adapt names/paths to the actual task)

## Example A: Create a file (turn N)
<tool_call>{"tool":"fs.write","arguments":{"path":"index.html","content":"<!doctype html><meta charset=\"utf-8\">"}}</tool_call>

## Example B: Read → then Edit (two turns)
# Turn N
<tool_call>{"tool":"fs.read","arguments":{"path":"index.html"}}</tool_call>
# Turn N+1
<tool_call>{"tool":"fs.edit","arguments":{"path":"index.html","old_text":"Old","new_text":"New"}}</tool_call>

## Example C: Make a directory, list it (two turns)
# Turn N
<tool_call>{"tool":"fs.mkdir","arguments":{"path":"assets/images"}}</tool_call>
# Turn N+1
<tool_call>{"tool":"fs.ls","arguments":{"path":"assets"}}</tool_call>

## Example D: Start a simple server (three turns; only if npm.* tools are allowed)
# Turn N
<tool_call>{"tool":"npm.init","arguments":{}}</tool_call>
# Turn N+1
<tool_call>{"tool":"npm.start","arguments":{}}</tool_call>
# Turn N+2
<tool_call>{"tool":"npm.status","arguments":{}}</tool_call>

## Example E: Handle protected paths safely
# If you need to view a protected file, read it (allowed); avoid write/delete.
<tool_call>{"tool":"fs.read","arguments":{"path":".waa/instruction.md"}}</tool_call>

## Example F: Finish when done
<terminate>

# REMINDERS
- ONE tool call per turn, or <terminate>.
- No extra text around tool calls, ever.
- Ensure JSON is valid; escape quotes properly in string content.
- Use only the tools actually allowed by the environment.

Return only <tool_call>...</tool_call> or <terminate>.
"#;

/// Agent 构建器：持有运行环境与候选工具
pub struct AgentBuilder {
    env: AgentEnvironment,
    candidates: Vec<Box<dyn Tool>>,
}

impl AgentBuilder {
    /// 候选工具默认为全部内置工具
    pub fn new(env: AgentEnvironment) -> Self {
        Self {
            env,
            candidates: builtin_tools(),
        }
    }

    /// 替换候选工具列表
    pub fn with_tools(mut self, tools: Vec<Box<dyn Tool>>) -> Self {
        self.candidates = tools;
        self
    }

    pub fn env(&self) -> &AgentEnvironment {
        &self.env
    }

    /// 构建注册表，消耗候选工具
    pub fn build_tool_registry(&mut self, log: &RunLog) -> ToolRegistry {
        let candidates = std::mem::take(&mut self.candidates);
        build_tool_registry(candidates, &self.env, log)
    }
}

/// allow-list 过滤 → initialize（fail-open）→ 注册（last-write-wins）
pub fn build_tool_registry(
    candidates: Vec<Box<dyn Tool>>,
    env: &AgentEnvironment,
    log: &RunLog,
) -> ToolRegistry {
    let allowed = env.allowed_tools();
    let mut registry = ToolRegistry::new();

    for mut tool in candidates {
        let name = tool.name().to_string();
        if name.is_empty() {
            log.warn("Skip a tool without name");
            continue;
        }
        if let Some(allowed) = &allowed {
            if !allowed.contains(&name) {
                log.info(&format!("Skipped tool (not allowed): {name}"));
                continue;
            }
        }
        if let Err(e) = tool.initialize(env) {
            log.warn(&format!("Tool initialize failed: {name}: {e}"));
            tracing::warn!(tool = %name, error = %e, "tool initialize failed");
        }
        if registry.register(tool).is_some() {
            log.warn(&format!("Replaced previously registered tool: {name}"));
        }
        log.info(&format!("Registered tool: {name}"));
    }

    tracing::info!(count = registry.len(), "tool registry built");
    registry
}

/// 协议正文 + tool call JSON Schema + 已注册工具列表
pub fn build_system_prompt(registry: &ToolRegistry) -> String {
    format!(
        "{SYSTEM_PROMPT}\n# TOOL CALL SCHEMA\n{}\n\n# AVAILABLE TOOLS\n{}\n",
        tool_call_schema_json(),
        registry.to_schema_json()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolError, ToolSchema};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use tempfile::TempDir;

    struct Probe {
        name: &'static str,
        fail_init: bool,
        reply: &'static str,
        schema: ToolSchema,
    }

    fn probe(name: &'static str, fail_init: bool, reply: &'static str) -> Box<dyn Tool> {
        Box::new(Probe {
            name,
            fail_init,
            reply,
            schema: ToolSchema::new(),
        })
    }

    #[async_trait]
    impl Tool for Probe {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "probe"
        }
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }
        fn initialize(&mut self, _env: &AgentEnvironment) -> Result<(), ToolError> {
            if self.fail_init {
                Err(ToolError::Io("no such directory".into()))
            } else {
                Ok(())
            }
        }
        async fn execute(&self, _args: &Map<String, Value>) -> Result<Value, ToolError> {
            Ok(json!(self.reply))
        }
    }

    fn setup(config: &str) -> (TempDir, AgentEnvironment, RunLog) {
        let dir = TempDir::new().unwrap();
        let env = AgentEnvironment::from_json(dir.path(), config).unwrap();
        let log = RunLog::create(dir.path().join("agent.log"), false).unwrap();
        (dir, env, log)
    }

    #[tokio::test]
    async fn test_fail_open_and_last_write_wins() {
        let (_dir, env, log) = setup("{}");
        let registry = build_tool_registry(
            vec![
                probe("", false, ""),
                probe("a", true, "first"),
                probe("a", false, "second"),
                probe("b", true, "b"),
            ],
            &env,
            &log,
        );
        assert_eq!(registry.tool_names(), vec!["a".to_string(), "b".to_string()]);
        let out = registry.get("a").unwrap().execute(&Map::new()).await.unwrap();
        assert_eq!(out, json!("second"));
    }

    #[test]
    fn test_allow_list_filters_and_logs() {
        let (dir, env, log) = setup(r#"{"allowed_tools": ["fs.write", "fs.read"]}"#);
        let mut builder = AgentBuilder::new(env);
        let registry = builder.build_tool_registry(&log);
        assert_eq!(registry.tool_names(), vec!["fs.read".to_string(), "fs.write".to_string()]);
        drop(log);
        let text = std::fs::read_to_string(dir.path().join("agent.log")).unwrap();
        assert!(text.contains("Skipped tool (not allowed): fs.delete"));
        assert!(text.contains("Registered tool: fs.write"));
    }

    #[test]
    fn test_all_builtin_tools_registered_without_allow_list() {
        let (_dir, env, log) = setup("{}");
        let registry = AgentBuilder::new(env).build_tool_registry(&log);
        for name in ["npm.init", "supertest.run", "playwright.run", "fs.tree", "todo.add"] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert_eq!(registry.len(), 21);
    }

    #[test]
    fn test_system_prompt_sections() {
        let (_dir, env, log) = setup(r#"{"allowed_tools": ["fs.write"]}"#);
        let registry = AgentBuilder::new(env).build_tool_registry(&log);
        let prompt = build_system_prompt(&registry);
        assert!(prompt.starts_with("You are WAA (Web-App Agent)."));
        assert!(prompt.contains("# TOOL CALL SCHEMA"));
        assert!(prompt.contains("\"name\": \"fs.write\""));
        assert!(!prompt.contains("\"name\": \"fs.delete\""));
    }
}
