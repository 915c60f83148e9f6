//! 编排主循环
//!
//! 每回合：投影历史 → 调用 LLM → 追加 ModelResponse → 解析 → 执行工具或终止 → 追加结果。
//! 终止、回合耗尽、协议违规都正常返回 LoopState；只有 LLM 调用失败会以 AgentError 中止本次运行。

use serde_json::json;

use crate::core::{AgentError, LoopState};
use crate::llm::LlmClient;
use crate::memory::{History, ToolExecutionResult};
use crate::observability::RunLog;
use crate::react::parser::{parse_response, ParsedResponse, PARSE_ERROR_TOOL_NAME};
use crate::tools::{ToolExecutor, MISSING_TOOL_NAME};

/// 默认回合上限
pub const DEFAULT_MAX_TURNS: usize = 50;

/// 一次运行所需的协作者；History 由调用方持有并传入
pub struct ReactSession<'a> {
    llm: &'a dyn LlmClient,
    executor: &'a ToolExecutor,
    log: &'a RunLog,
    max_turns: usize,
}

impl<'a> ReactSession<'a> {
    pub fn new(llm: &'a dyn LlmClient, executor: &'a ToolExecutor, log: &'a RunLog) -> Self {
        Self {
            llm,
            executor,
            log,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// 运行至终止态；第 max_turns + 1 回合永不执行
    pub async fn run(&self, history: &mut History) -> Result<LoopState, AgentError> {
        let mut state = LoopState::NotStarted;

        for turn in 1..=self.max_turns {
            state = LoopState::Running { turn };
            tracing::debug!(turn, "turn start");

            let messages = history.project();
            self.log.log_llm_query(turn, messages.len());
            let response = match self.llm.complete(&messages).await {
                Ok(text) => text,
                Err(e) => {
                    self.log.error(&format!("LLM call failed at turn {turn}: {e}"));
                    self.log.log_termination(turn, "backend failure");
                    tracing::error!(turn, error = %e, "LLM call failed");
                    return Err(e.into());
                }
            };
            self.log.log_llm_response(turn, &response);
            history.append_response(response.clone());

            match parse_response(&response) {
                ParsedResponse::Terminate => {
                    self.log.info(&format!("Terminate at turn {turn}"));
                    state = LoopState::Terminated { turn };
                    break;
                }
                ParsedResponse::ToolCall(request) => {
                    let name = request.tool_name().unwrap_or(MISSING_TOOL_NAME);
                    self.log.info(&format!(">>> Executing tool: {name}"));
                    self.log.debug(&format!("Arguments: {}", request.arguments));
                    let result = self.executor.dispatch(&request).await;
                    self.log
                        .log_tool_result(result.tool_name(), result.result(), result.error());
                    history.append_tool_result(result);
                }
                ParsedResponse::ParseError { raw, error } => {
                    self.log.error(&error);
                    history.append_tool_result(ToolExecutionResult::failure(
                        PARSE_ERROR_TOOL_NAME,
                        json!({ "raw": raw }),
                        error,
                    ));
                }
                ParsedResponse::Violation => {
                    self.log
                        .warn("LLM output had no <tool_call> or <terminate>. Stopping.");
                    state = LoopState::ProtocolViolated { turn };
                    break;
                }
            }
        }

        if !state.is_terminal() {
            self.log.warn(&format!(
                "Reached max_turns={} without termination.",
                self.max_turns
            ));
            state = LoopState::Exhausted {
                turns: self.max_turns,
            };
        }

        self.log.log_termination(state.turns(), state.reason());
        tracing::info!(state = state.reason(), turns = state.turns(), "loop finished");
        Ok(state)
    }
}

/// 便捷入口：等价于 `ReactSession::new(..).with_max_turns(..).run(history)`
pub async fn react_loop(
    llm: &dyn LlmClient,
    executor: &ToolExecutor,
    history: &mut History,
    log: &RunLog,
    max_turns: usize,
) -> Result<LoopState, AgentError> {
    ReactSession::new(llm, executor, log)
        .with_max_turns(max_turns)
        .run(history)
        .await
}
