//! 运行日志（`.waa/agent.log`）
//!
//! 每次运行独占一个文件：文件已存在则拒绝创建，避免覆盖上一次运行的记录。
//! 行格式 `[YYYY-MM-DD HH:MM:SS] [LEVEL] message`；系统提示、用户指令、模型回复以分隔块原样写入。
//! 写入失败只发 warn，不影响主循环。Drop 时写入结束标记并 flush。

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::core::AgentError;
use crate::memory::value_to_text;

const RULE: &str = "================================================================================";
const THIN_RULE: &str = "--------------------------------------------------------------------------------";

/// 结果预览最大字符数
const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

pub struct RunLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    run_id: Uuid,
    /// 同时输出到 tracing（--debug）
    echo: bool,
}

impl RunLog {
    /// 独占创建日志文件；已存在时返回 `AgentError::LogExists`
    pub fn create(path: impl AsRef<Path>, echo: bool) -> Result<Self, AgentError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AgentError::LogExists(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let log = Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            run_id: Uuid::new_v4(),
            echo,
        };
        log.write_raw(&format!(
            "=== WAA Agent Log ===\nStarted: {}\nRun: {}\n{}\n",
            Local::now().to_rfc3339(),
            log.run_id,
            RULE
        ));
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn write_raw(&self, text: &str) {
        let Ok(mut writer) = self.writer.lock() else {
            warn!("Run log writer poisoned: {}", self.path.display());
            return;
        };
        let mut line = text.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        if let Err(e) = writer.write_all(line.as_bytes()) {
            warn!("Failed to write run log {}: {}", self.path.display(), e);
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.write_raw(&format!("[{timestamp}] [{level}] {message}"));
        if self.echo {
            match level {
                LogLevel::Debug => tracing::debug!("{message}"),
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warning => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            }
        }
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// 标题 + 原文块（原文不加时间戳前缀）
    pub fn block(&self, title: &str, body: &str) {
        self.info(RULE);
        self.info(title);
        self.info(THIN_RULE);
        self.write_raw(body);
        self.info(RULE);
    }

    pub fn log_system_prompt(&self, prompt: &str) {
        self.block("SYSTEM PROMPT", prompt);
    }

    pub fn log_user_instruction(&self, instruction: &str) {
        self.block("USER INSTRUCTION", instruction);
    }

    pub fn log_llm_query(&self, turn: usize, message_count: usize) {
        self.info(&format!(
            ">>> Turn {turn}: Querying LLM with {message_count} messages in history"
        ));
    }

    pub fn log_llm_response(&self, turn: usize, response: &str) {
        self.block(&format!("LLM RESPONSE (Turn {turn})"), response);
    }

    pub fn log_tool_result(&self, tool_name: &str, result: Option<&Value>, error: Option<&str>) {
        match error {
            Some(err) => self.error(&format!("[Tool ERR] {tool_name} -> {err}")),
            None => {
                let text = result.map(value_to_text).unwrap_or_else(|| "null".to_string());
                self.info(&format!("[Tool OK] {tool_name} -> {}", preview(&text)));
            }
        }
    }

    pub fn log_termination(&self, turns: usize, reason: &str) {
        self.info(RULE);
        self.info(&format!("AGENT TERMINATED - {reason}"));
        self.info(&format!("Total turns: {turns}"));
        self.info(RULE);
    }

    pub fn flush(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush run log {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.write_raw(&format!("=== Run {} closed ===", self.run_id));
        self.flush();
    }
}

/// 按字符截断，超出部分标记 `...(truncated)`
fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...(truncated)")
}
