//! 历史持久化
//!
//! 运行结束后把 History 写成 JSON（`.waa/history.json`），作为可机读的审计记录；
//! 每条含 kind、时间戳与内容。每次运行覆盖上一份。

use std::path::{Path, PathBuf};

use crate::memory::History;

/// 单文件 JSON 持久化
#[derive(Debug)]
pub struct HistoryPersistence {
    path: PathBuf,
}

impl HistoryPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入 JSON 文件；父目录不存在时自动创建
    pub fn save(&self, history: &History) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(history.entries())?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ToolExecutionResult;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_writes_tagged_entries() {
        let dir = TempDir::new().unwrap();
        let store = HistoryPersistence::new(dir.path().join(".waa/history.json"));

        let mut history = History::new("sys", "task");
        history.append_response("<terminate>");
        history.append_tool_result(ToolExecutionResult::failure("x", json!({}), "Unknown tool: x"));
        store.save(&history).unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        let raw: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[0]["kind"], "system_prompt");
        assert_eq!(raw[1]["kind"], "user_instruction");
        assert_eq!(raw[2]["kind"], "model_response");
        assert_eq!(raw[3]["kind"], "tool_result");
        assert_eq!(raw[3]["error"], "Unknown tool: x");
    }
}
