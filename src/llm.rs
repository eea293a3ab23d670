//! Language-model client.
//!
//! [`LanguageModel`] is the seam the answer engine calls through;
//! [`ChatCompletionsModel`] implements it against any OpenAI-compatible
//! `/v1/chat/completions` endpoint (hosted or a local server).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{AppError, Result};

/// A model that turns a system and user prompt into free text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Generate a reply. Must return promptly with [`AppError::Timeout`]
    /// once `cancel` fires.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible servers.
#[derive(Debug)]
pub struct ChatCompletionsModel {
    config: LlmConfig,
    client: reqwest::Client,
}

impl ChatCompletionsModel {
    /// Create a client from `config`.
    pub fn new(config: LlmConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build model HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send(&self, system: &str, user: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Model(format!("request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Model(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(map_http_error(status, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::Model(format!("undecodable response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Model("response contained no message content".into()))?;
        debug!(
            model = %self.config.model,
            chars = content.len(),
            "model reply received"
        );
        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Timeout("model request cancelled".into())),
            reply = self.send(system, user) => reply,
        }
    }
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> AppError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => AppError::Model(format!("authentication failed: {message}")),
        429 => AppError::Model(format!("rate limited: {message}")),
        code => AppError::Model(format!("HTTP {code}: {message}")),
    }
}

/// Extract an error message from an OpenAI-style error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
