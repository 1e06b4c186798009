//! Chat completion providers.
//!
//! Mirrors [`crate::embedding`]: a [`ChatProvider`] trait, a disabled
//! implementation that always errors, and an OpenAI implementation on
//! `POST /v1/chat/completions` sharing the same retry policy.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::error::ShowroomError;
use crate::openai::OpenAIClient;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn model_name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Complete one exchange and return the assistant's text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Used when `generation.provider = "disabled"`; replies fall back to templates.
pub struct DisabledChat;

#[async_trait]
impl ChatProvider for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn is_enabled(&self) -> bool {
        false
    }
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Err(ShowroomError::Upstream("generation provider is disabled".to_string()).into())
    }
}

pub struct OpenAIChat {
    client: OpenAIClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIChat {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let client = OpenAIClient::from_env(config.timeout_secs, config.max_retries)?;

        Ok(Self {
            client,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let json = self.client.post_json("/chat/completions", &body).await?;
        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::trim)
        .ok_or_else(|| ShowroomError::Upstream("completion has no message content".to_string()))?;

    if content.is_empty() {
        return Err(ShowroomError::Upstream("completion is empty".to_string()).into());
    }
    Ok(content.to_string())
}

/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledChat`] |
/// | `"openai"` | [`OpenAIChat`] |
pub fn create_chat_provider(config: &GenerationConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Hi there!  "}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Hi there!");
    }

    #[test]
    fn test_parse_completion_missing_or_empty() {
        assert!(parse_completion(&serde_json::json!({"choices": []})).is_err());
        let empty = serde_json::json!({"choices": [{"message": {"content": " "}}]});
        assert!(parse_completion(&empty).is_err());
    }

    #[tokio::test]
    async fn test_disabled_chat() {
        let provider = create_chat_provider(&GenerationConfig::default()).unwrap();
        assert!(!provider.is_enabled());
        assert!(provider.complete("s", "u").await.is_err());
    }
}
