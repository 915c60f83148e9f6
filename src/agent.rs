//! Agent 运行时
//!
//! 一次运行的完整流程：加载配置 → 创建 LLM 后端 → 打开运行日志 → 构建工具注册表 →
//! 组装系统提示词 → 读取用户指令 → 跑编排循环 → 保存历史。
//! 启动阶段任一步失败都直接返回 AgentError，不会调用模型。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{load_config, AgentEnvironment};
use crate::core::{build_system_prompt, AgentBuilder, AgentError, LoopState};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{History, HistoryPersistence};
use crate::observability::RunLog;
use crate::react::ReactSession;
use crate::tools::{Tool, ToolExecutor};

pub const LOG_FILE: &str = "agent.log";
pub const INSTRUCTION_FILE: &str = "instruction.md";
pub const HISTORY_FILE: &str = "history.json";

/// 一次运行的结果：终止态 + 完整历史
#[derive(Debug)]
pub struct RunReport {
    pub state: LoopState,
    pub history: History,
}

/// 单次运行的 Agent
pub struct Agent {
    working_dir: PathBuf,
    debug: bool,
    llm: Option<Arc<dyn LlmClient>>,
    tools: Option<Vec<Box<dyn Tool>>>,
}

impl Agent {
    pub fn new(working_dir: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            working_dir: working_dir.into(),
            debug,
            llm: None,
            tools: None,
        }
    }

    /// 注入 LLM 后端（跳过 llm_type 解析）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 替换候选工具（默认为全部内置工具）
    pub fn with_tools(mut self, tools: Vec<Box<dyn Tool>>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub async fn run(self) -> Result<RunReport, AgentError> {
        let env = load_config(&self.working_dir)?;
        let llm = match self.llm {
            Some(llm) => llm,
            None => create_llm_from_config(env.app_config())?,
        };

        let log = RunLog::create(env.waa_dir().join(LOG_FILE), self.debug)?;
        log.info("Agent initialization started");
        log.info(&format!("Working directory: {}", self.working_dir.display()));
        log.info(&format!("Debug mode: {}", self.debug));
        log.info(&format!("LLM backend: {}", llm.name()));
        log.info(&format!("Max turns: {}", env.max_turns()));

        let max_turns = env.max_turns();
        let mut builder = AgentBuilder::new(env);
        if let Some(tools) = self.tools {
            builder = builder.with_tools(tools);
        }
        let registry = builder.build_tool_registry(&log);
        let system_prompt = build_system_prompt(&registry);
        log.log_system_prompt(&system_prompt);

        let instruction = read_instruction(builder.env())?;
        log.log_user_instruction(&instruction);

        let executor = ToolExecutor::new(registry);
        let mut history = History::new(system_prompt, instruction);
        log.info("Agent initialized successfully");

        let state = ReactSession::new(llm.as_ref(), &executor, &log)
            .with_max_turns(max_turns)
            .run(&mut history)
            .await?;

        let store = HistoryPersistence::new(builder.env().waa_dir().join(HISTORY_FILE));
        if let Err(e) = store.save(&history) {
            log.warn(&format!("Failed to save history: {e}"));
        }
        log.flush();

        Ok(RunReport { state, history })
    }
}

fn read_instruction(env: &AgentEnvironment) -> Result<String, AgentError> {
    let path = env.waa_dir().join(INSTRUCTION_FILE);
    if !path.exists() {
        return Err(AgentError::InstructionNotFound(path));
    }
    Ok(std::fs::read_to_string(&path)?)
}
