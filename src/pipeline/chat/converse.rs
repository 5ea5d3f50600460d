use super::prompt::{build_system_prompt, split_reply};
use super::types::{ChatOutcome, ChatService, ChatTurn, DocumentContext};
use super::{ChatError, ChatUpstreamError};
use crate::models::ChatRole;

/// Only the most recent turns are forwarded to the model.
pub const MAX_HISTORY_TURNS: usize = 20;

/// Shown when the chat model cannot be used.
pub const FALLBACK_REPLY: &str = "Sorry, I can't reach the writing assistant right now. \
Your letter and draft are unchanged. Please try again in a moment.";

/// One chat exchange. Upstream failures degrade to [`FALLBACK_REPLY`]; only
/// a malformed history is an error.
pub async fn converse(
    service: &dyn ChatService,
    history: &[ChatTurn],
    context: Option<&DocumentContext>,
) -> Result<ChatOutcome, ChatError> {
    let last = history.last().ok_or(ChatError::EmptyHistory)?;
    if last.role != ChatRole::User {
        return Err(ChatError::LastTurnNotUser);
    }
    if last.content.trim().is_empty() {
        return Err(ChatError::BlankMessage);
    }

    let window = &history[history.len().saturating_sub(MAX_HISTORY_TURNS)..];
    let system_prompt = build_system_prompt(context);

    let completion = service
        .complete(&system_prompt, window)
        .await
        .and_then(|text| {
            if text.trim().is_empty() {
                Err(ChatUpstreamError::EmptyReply)
            } else {
                Ok(text)
            }
        });

    match completion {
        Ok(text) => {
            let (reply, suggested_draft) = split_reply(&text);
            tracing::debug!(
                grounded = context.is_some(),
                turns = window.len(),
                reply_len = reply.len(),
                has_draft = suggested_draft.is_some(),
                "Chat exchange complete"
            );
            Ok(ChatOutcome {
                reply,
                suggested_draft,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "Chat upstream failed, using fallback reply");
            Ok(ChatOutcome {
                reply: FALLBACK_REPLY.to_string(),
                suggested_draft: None,
            })
        }
    }
}
