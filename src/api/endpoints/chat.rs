//! Chat endpoint.
//!
//! `POST /api/chat`: one exchange with the writing assistant, in general
//! mode or grounded on one of the caller's documents.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OwnerContext};
use crate::pipeline::chat::{converse, ChatOutcome, ChatTurn, DocumentContext};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    pub document_id: Option<Uuid>,
}

pub async fn send(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let context = match request.document_id {
        Some(id) => {
            let record = ctx
                .core
                .ingestor
                .get(&caller.owner, &id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Document {id}")))?;
            Some(DocumentContext::from_record(&record))
        }
        None => None,
    };

    let outcome = converse(ctx.core.chat.as_ref(), &request.messages, context.as_ref()).await?;
    Ok(Json(outcome))
}
