//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Gemini / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;

pub use deepseek::{
    create_deepseek_client, create_gemini_client, resolve_api_key, DEEPSEEK_CHAT, DEEPSEEK_REASONER,
    GEMINI_DEFAULT_MODEL,
};
pub use mock::{MockLlmClient, DEFAULT_MOCK_RESPONSES};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError};

/// 按 `llm_type` 创建后端；未知类型或缺少凭证属于启动期致命错误
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let model = cfg.model.as_deref();
    let api_key = cfg.api_key.as_deref();
    let client: Arc<dyn LlmClient> = match cfg.llm_type.as_str() {
        "mock" => Arc::new(MockLlmClient::new(
            cfg.mock_responses.clone().unwrap_or_default(),
        )),
        "gemini" => Arc::new(
            create_gemini_client(model, api_key, cfg.base_url.as_deref())
                .map_err(startup_error)?,
        ),
        "deepseek" => Arc::new(create_deepseek_client(model, api_key).map_err(startup_error)?),
        "openai" => {
            let key = resolve_api_key(api_key, "OPENAI_API_KEY").map_err(startup_error)?;
            Arc::new(OpenAiClient::new(
                cfg.base_url.as_deref(),
                model.unwrap_or("gpt-4o-mini"),
                &key,
            ))
        }
        other => return Err(AgentError::UnknownLlmType(other.to_string())),
    };
    tracing::info!(backend = client.name(), "LLM backend ready");
    Ok(client)
}

fn startup_error(err: LlmError) -> AgentError {
    match err {
        LlmError::MissingCredential(var) => AgentError::MissingCredential(var),
        other => AgentError::Llm(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_llm_type() {
        let cfg = AppConfig {
            llm_type: "claude-9".into(),
            ..AppConfig::default()
        };
        let err = create_llm_from_config(&cfg).err().unwrap();
        assert!(matches!(err, AgentError::UnknownLlmType(ref t) if t == "claude-9"));
    }

    #[test]
    fn test_mock_is_default() {
        let client = create_llm_from_config(&AppConfig::default()).unwrap();
        assert_eq!(client.name(), "mock");
    }
}
