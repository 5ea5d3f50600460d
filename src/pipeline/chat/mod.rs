//! Chat draft-suggestion loop.
//!
//! `converse` turns a chat history (plus optional document grounding) into a
//! reply and, when the model embeds one, a suggested draft. `DraftEditor`
//! applies or reverts such a suggestion on a stored record.

pub mod converse;
pub mod prompt;
pub mod revision;
pub mod types;

pub use converse::*;
pub use prompt::*;
pub use revision::*;
pub use types::*;

use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::ollama::OllamaError;
use crate::pipeline::records::RecordStoreError;

/// Upstream chat completion failed. Never reaches the end user; `converse`
/// degrades it to a scripted reply.
#[derive(Error, Debug)]
pub enum ChatUpstreamError {
    #[error("Chat model call failed: {0}")]
    Ollama(#[from] OllamaError),

    #[error("Chat model returned an empty reply")]
    EmptyReply,
}

/// Caller-side contract violations and draft persistence failures.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat history is empty")]
    EmptyHistory,

    #[error("Last chat turn must come from the user")]
    LastTurnNotUser,

    #[error("Last user message is blank")]
    BlankMessage,

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Record store error: {0}")]
    Records(#[from] RecordStoreError),
}
