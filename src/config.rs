//! 应用配置：从 `<working_dir>/.waa/config.json` 与环境变量加载
//!
//! 加载顺序：先读 JSON 文件（必须存在），再用环境变量 `WAA__*` 覆盖（双下划线表示嵌套，如
//! `WAA__MAX_TURNS=10`、`WAA__SERVER__TIMEOUT=10`）。
//!
//! 提供两种视图：
//! - [`AppConfig`]：核心用到的键（LLM 后端、max_turns、allowed_tools、protected_files）
//! - [`AgentEnvironment::get_config_value`]：按点号路径读取任意键，供工具在 initialize 时使用

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::AgentError;

/// 工作目录下存放配置、指令、日志的目录名
pub const WAA_DIR: &str = ".waa";

pub fn waa_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(WAA_DIR)
}

pub fn config_path(working_dir: &Path) -> PathBuf {
    waa_dir(working_dir).join("config.json")
}

/// 配置根（对应 config.json 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 后端：mock / gemini / openai / deepseek
    pub llm_type: String,
    pub model: Option<String>,
    /// 未设置时从对应环境变量读取（GEMINI_API_KEY / OPENAI_API_KEY / DEEPSEEK_API_KEY）
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// mock 后端按顺序循环返回的脚本
    pub mock_responses: Option<Vec<String>>,
    /// 单次运行的最大回合数
    pub max_turns: usize,
    /// 允许注册的工具名；None 表示全部
    pub allowed_tools: Option<Vec<String>>,
    /// 工作目录下禁止写入/删除的相对路径
    pub protected_files: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_type: "mock".to_string(),
            model: None,
            api_key: None,
            base_url: None,
            mock_responses: None,
            max_turns: default_max_turns(),
            allowed_tools: None,
            protected_files: Vec::new(),
        }
    }
}

fn default_max_turns() -> usize {
    50
}

/// 运行环境：工作目录 + 原始配置树 + 类型化配置
#[derive(Debug, Clone)]
pub struct AgentEnvironment {
    working_dir: PathBuf,
    config: Config,
    app: AppConfig,
}

impl AgentEnvironment {
    pub fn new(working_dir: impl Into<PathBuf>, config: Config) -> Result<Self, ConfigError> {
        let app = config.clone().try_deserialize()?;
        Ok(Self {
            working_dir: working_dir.into(),
            config,
            app,
        })
    }

    /// 直接从 JSON 文本构建（不读文件、不叠加环境变量）
    pub fn from_json(working_dir: impl Into<PathBuf>, json: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .build()?;
        Self::new(working_dir, config)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn waa_dir(&self) -> PathBuf {
        waa_dir(&self.working_dir)
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app
    }

    /// 点号路径读取（如 `server.timeout`）；键不存在或类型不符时返回 None
    pub fn get_config_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config.get::<T>(key).ok()
    }

    pub fn get_config_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_config_value(key).unwrap_or(default)
    }

    pub fn max_turns(&self) -> usize {
        self.app.max_turns
    }

    pub fn allowed_tools(&self) -> Option<HashSet<String>> {
        self.app
            .allowed_tools
            .as_ref()
            .map(|names| names.iter().cloned().collect())
    }
}

/// 从工作目录加载配置；config.json 不存在属于启动期致命错误
pub fn load_config(working_dir: &Path) -> Result<AgentEnvironment, AgentError> {
    let path = config_path(working_dir);
    if !path.exists() {
        return Err(AgentError::ConfigNotFound(path));
    }

    let config = Config::builder()
        .add_source(File::from(path).format(FileFormat::Json).required(true))
        .add_source(
            Environment::with_prefix("WAA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(AgentEnvironment::new(working_dir, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_keys_missing() {
        let env = AgentEnvironment::from_json(".", "{}").unwrap();
        assert_eq!(env.max_turns(), 50);
        assert_eq!(env.app_config().llm_type, "mock");
        assert!(env.allowed_tools().is_none());
    }

    #[test]
    fn test_dotted_path_lookup() {
        let env = AgentEnvironment::from_json(
            ".",
            r#"{"max_turns": 7, "server": {"timeout": 12}, "allowed_tools": ["fs.read"]}"#,
        )
        .unwrap();
        assert_eq!(env.max_turns(), 7);
        assert_eq!(env.get_config_value::<u64>("server.timeout"), Some(12));
        assert_eq!(env.get_config_value::<u64>("server.missing"), None);
        assert_eq!(env.get_config_or::<u64>("supertest.timeout", 30), 30);
        let allowed = env.allowed_tools().unwrap();
        assert!(allowed.contains("fs.read"));
        assert_eq!(allowed.len(), 1);
    }

    #[test]
    fn test_missing_config_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, AgentError::ConfigNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".waa")).unwrap();
        std::fs::write(
            dir.path().join(".waa/config.json"),
            r#"{"llm_type": "mock", "max_turns": 3, "protected_files": [".waa"]}"#,
        )
        .unwrap();
        let env = load_config(dir.path()).unwrap();
        assert_eq!(env.max_turns(), 3);
        assert_eq!(env.app_config().protected_files, vec![".waa".to_string()]);
        assert_eq!(env.working_dir(), dir.path());
    }
}
