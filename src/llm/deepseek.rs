//! DeepSeek / Gemini 客户端工厂（均为 OpenAI 兼容格式）
//!
//! - DeepSeek Base URL: https://api.deepseek.com，模型 deepseek-chat / deepseek-reasoner
//! - Gemini 走 Google 提供的 OpenAI 兼容端点，默认 gemini-2.5-flash，温度固定为 0

use crate::llm::{LlmError, OpenAiClient};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// 显式 key 优先，否则读环境变量；都没有则报 MissingCredential
pub fn resolve_api_key(explicit: Option<&str>, env_var: &str) -> Result<String, LlmError> {
    explicit
        .filter(|k| !k.is_empty())
        .map(String::from)
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
        .ok_or_else(|| LlmError::MissingCredential(env_var.to_string()))
}

/// 创建 DeepSeek 客户端
///
/// - key：`api_key` 或环境变量 `DEEPSEEK_API_KEY`
/// - 模型：`model` 或 `DEEPSEEK_MODEL`，默认 `deepseek-chat`
pub fn create_deepseek_client(
    model: Option<&str>,
    api_key: Option<&str>,
) -> Result<OpenAiClient, LlmError> {
    let api_key = resolve_api_key(api_key, "DEEPSEEK_API_KEY")?;
    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    Ok(OpenAiClient::new(Some(DEEPSEEK_BASE_URL), &model, &api_key).with_backend("deepseek"))
}

/// 创建 Gemini 客户端（key：`api_key` 或 `GEMINI_API_KEY`）
pub fn create_gemini_client(
    model: Option<&str>,
    api_key: Option<&str>,
    base_url: Option<&str>,
) -> Result<OpenAiClient, LlmError> {
    let api_key = resolve_api_key(api_key, "GEMINI_API_KEY")?;
    let model = model.unwrap_or(GEMINI_DEFAULT_MODEL);
    Ok(
        OpenAiClient::new(Some(base_url.unwrap_or(GEMINI_BASE_URL)), model, &api_key)
            .with_backend("gemini")
            .with_temperature(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let key = resolve_api_key(Some("sk-explicit"), "WAA_TEST_UNSET_KEY_VAR").unwrap();
        assert_eq!(key, "sk-explicit");
    }

    #[test]
    fn test_missing_key_is_error() {
        let err = resolve_api_key(None, "WAA_TEST_UNSET_KEY_VAR").unwrap_err();
        assert!(matches!(err, LlmError::MissingCredential(ref v) if v == "WAA_TEST_UNSET_KEY_VAR"));
        assert!(err.to_string().contains("WAA_TEST_UNSET_KEY_VAR"));
    }

    #[test]
    fn test_gemini_defaults() {
        let client = create_gemini_client(None, Some("k"), None).unwrap();
        assert_eq!(client.model(), GEMINI_DEFAULT_MODEL);
    }
}
