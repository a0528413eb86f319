//! Language-model completion provider.
//!
//! The query pipeline only needs one operation: turn a system prompt and a
//! user prompt into text. [`OpenAIChat`] implements it against the
//! `/chat/completions` endpoint. No retry is attempted; failures are handed
//! back so the pipeline can fall back to an extractive answer.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::embedding::build_client;
use crate::error::Error;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Inputs for a single completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Chat completion via the OpenAI API.
pub struct OpenAIChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIChat {
    pub fn new(config: &GenerationConfig) -> crate::error::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key,
            model: config.model.clone(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;
    Ok(content.trim().to_string())
}

/// Create the configured completion provider, or `None` when generation is
/// disabled.
pub fn create_generator(
    config: &GenerationConfig,
) -> crate::error::Result<Option<Arc<dyn CompletionProvider>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => Ok(Some(Arc::new(OpenAIChat::new(config)?))),
        other => Err(Error::Configuration(format!(
            "Unknown generation provider: {}",
            other
        ))),
    }
}
