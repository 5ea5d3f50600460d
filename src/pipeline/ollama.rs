//! Async HTTP client for the local Ollama model server.
//!
//! One client serves both collaborators of the pipeline: the vision
//! analyzer (`VisionClient`) and the chat loop (`ChatService`). Both go
//! through `/api/chat`, which is what chat-template vision models expect.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::chat::{ChatService, ChatTurn, ChatUpstreamError};
use crate::pipeline::extraction::VisionClient;

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Ollama is not reachable at {0}")]
    NotReachable(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama returned error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Ollama HTTP client.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
    chat_model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64, chat_model: &str) -> Result<Self, OllamaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OllamaError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
            chat_model: chat_model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_chat(&self, body: &ChatRequest<'_>) -> Result<String, OllamaError> {
        let url = format!("{}/api/chat", self.base_url);
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OllamaError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::ResponseParsing(e.to_string()))?;

        tracing::debug!(
            model = body.model,
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = parsed.message.content.len(),
            "Ollama chat call complete"
        );

        Ok(parsed.message.content)
    }

    fn classify(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::NotReachable(self.base_url.clone())
        } else if e.is_timeout() {
            OllamaError::Timeout(self.timeout_secs)
        } else {
            OllamaError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Serialize)]
struct GenerationOptions {
    temperature: f32,
}

/// Response body from Ollama /api/chat (non-streaming)
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl VisionClient for OllamaClient {
    async fn chat_with_images(
        &self,
        model: &str,
        user_prompt: &str,
        images: &[String],
        system: Option<&str>,
    ) -> Result<String, OllamaError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
                images: None,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user_prompt,
            images: Some(images),
        });

        let body = ChatRequest {
            model,
            messages,
            stream: false,
            // Extraction must be reproducible.
            options: GenerationOptions { temperature: 0.0 },
        };
        self.post_chat(&body).await
    }
}

#[async_trait]
impl ChatService for OllamaClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatTurn],
    ) -> Result<String, ChatUpstreamError> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(ChatMessage {
            role: "system",
            content: system_prompt,
            images: None,
        });
        for turn in messages {
            wire.push(ChatMessage {
                role: turn.role.as_str(),
                content: &turn.content,
                images: None,
            });
        }

        let body = ChatRequest {
            model: &self.chat_model,
            messages: wire,
            stream: false,
            options: GenerationOptions { temperature: 0.4 },
        };
        Ok(self.post_chat(&body).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatRole;

    #[test]
    fn client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 60, "llama3").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.timeout_secs, 60);
    }

    #[test]
    fn chat_request_serializes_images_only_when_present() {
        let images = vec!["aGVsbG8=".to_string()];
        let body = ChatRequest {
            model: "llava",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "sys",
                    images: None,
                },
                ChatMessage {
                    role: "user",
                    content: "read this",
                    images: Some(images.as_slice()),
                },
            ],
            stream: false,
            options: GenerationOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["messages"][0].get("images").is_none());
        assert_eq!(json["messages"][1]["images"][0], "aGVsbG8=");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn chat_response_parses_message_content() {
        let raw = r#"{"model":"llama3","message":{"role":"assistant","content":"Hello"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "Hello");
    }

    #[tokio::test]
    async fn unreachable_server_maps_to_upstream_error() {
        // Port 9 (discard) is closed on test machines; connect fails fast.
        let client = OllamaClient::new("http://127.0.0.1:9", 2, "llama3").unwrap();
        let turns = vec![ChatTurn {
            role: ChatRole::User,
            content: "hi".into(),
        }];
        let result = client.complete("system", &turns).await;
        assert!(result.is_err());
    }
}
