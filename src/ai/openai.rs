use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionGateway, ContentPart};
use crate::config::AppConfig;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

/// Chat, vision and transcription against the OpenAI HTTP API.
pub struct OpenAIGateway {
    client: Client,
    config: AppConfig,
}

impl OpenAIGateway {
    pub fn new(config: AppConfig) -> Result<Self> {
        if config.openai_api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key not configured. Set OPENAI_API_KEY or add it to config.json."
                    .to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.openai_base_url.trim_end_matches('/'), path)
    }

    async fn chat(&self, request: &OpenAIRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.config.openai_api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Network(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to read OpenAI response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        log::debug!("OpenAI returned {} chars from {}", content.len(), request.model);
        Ok(content)
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionGateway for OpenAIGateway {
    async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<String> {
        let request = OpenAIRequest {
            model: &self.config.chat_model,
            messages: vec![
                OpenAIMessage {
                    role: "system",
                    content: serde_json::Value::String(system_prompt.to_string()),
                },
                OpenAIMessage {
                    role: "user",
                    content: serde_json::Value::String(user_prompt.to_string()),
                },
            ],
            max_tokens,
            response_format: json_mode.then(|| serde_json::json!({ "type": "json_object" })),
        };

        self.chat(&request).await
    }

    async fn complete_vision(
        &self,
        system_prompt: &str,
        parts: &[ContentPart<'_>],
        max_tokens: u32,
    ) -> Result<String> {
        let content: Vec<serde_json::Value> = parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => serde_json::json!({
                    "type": "text",
                    "text": text
                }),
                ContentPart::Image(bytes) => serde_json::json!({
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:image/png;base64,{}", STANDARD.encode(bytes))
                    }
                }),
            })
            .collect();

        let request = OpenAIRequest {
            model: &self.config.vision_model,
            messages: vec![
                OpenAIMessage {
                    role: "system",
                    content: serde_json::Value::String(system_prompt.to_string()),
                },
                OpenAIMessage {
                    role: "user",
                    content: serde_json::Value::Array(content),
                },
            ],
            max_tokens,
            response_format: None,
        };

        self.chat(&request).await
    }

    async fn transcribe_audio(&self, audio: &[u8]) -> Result<String> {
        super::stt::transcribe_with_openai(self, audio).await
    }
}

/// Maps a non-success HTTP status onto the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: String) -> Error {
    if status == StatusCode::UNAUTHORIZED {
        let message = if body.trim().is_empty() {
            "Authentication required".to_string()
        } else {
            body
        };
        return Error::Auth(message);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        log::warn!("OpenAI rate limit hit");
    }

    Error::Upstream {
        status: status.as_u16(),
        message: body,
    }
}
