use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ChatUpstreamError;
use crate::models::{ChatRole, DocumentRecord, LetterAnalysis};
use crate::pipeline::ollama::OllamaError;

/// One chat message. Not persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.to_string(),
        }
    }
}

/// Grounding for one document. Absent context means general mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    pub ocr_text: Option<String>,
    pub analysis: Option<LetterAnalysis>,
    pub current_draft: Option<String>,
}

impl DocumentContext {
    pub fn from_record(record: &DocumentRecord) -> Self {
        Self {
            ocr_text: record.ocr_text.clone(),
            analysis: record.analysis.clone(),
            current_draft: record.draft.current.clone(),
        }
    }
}

/// Result of one chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub reply: String,
    pub suggested_draft: Option<String>,
}

/// `complete(system_prompt, messages) -> text`.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatTurn],
    ) -> Result<String, ChatUpstreamError>;
}

// ──────────────────────────────────────────────
// MockChatService (testing)
// ──────────────────────────────────────────────

/// Mock chat service returning a fixed reply, or failing as if the model
/// server were down. Remembers the last request it saw.
pub struct MockChatService {
    response: Option<String>,
    last_request: Mutex<Option<(String, Vec<ChatTurn>)>>,
}

impl MockChatService {
    pub fn new(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            last_request: Mutex::new(None),
        }
    }

    /// System prompt and forwarded turns of the most recent call.
    pub fn last_request(&self) -> Option<(String, Vec<ChatTurn>)> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl ChatService for MockChatService {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatTurn],
    ) -> Result<String, ChatUpstreamError> {
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = Some((system_prompt.to_string(), messages.to_vec()));
        }
        match &self.response {
            Some(text) => Ok(text.clone()),
            None => Err(OllamaError::NotReachable("http://mock".to_string()).into()),
        }
    }
}
