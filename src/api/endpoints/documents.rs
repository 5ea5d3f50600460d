//! Document endpoints: upload, list/search, detail, delete, raw original,
//! and draft apply/undo.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OwnerContext};
use crate::models::{DocumentRecord, DocumentStatus, LetterAnalysis};
use crate::pipeline::import::sanitize_file_name;
use crate::pipeline::orchestrator::UploadedFile;

/// Client view of a record. The storage location stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub ocr_text: Option<String>,
    pub analysis: Option<LetterAnalysis>,
    pub draft_reply: Option<String>,
    pub can_undo: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentRecord> for DocumentView {
    fn from(record: DocumentRecord) -> Self {
        let can_undo = record.draft.can_undo();
        Self {
            id: record.id,
            file_name: record.file_name,
            mime_type: record.mime_type,
            status: record.status,
            ocr_text: record.ocr_text,
            analysis: record.analysis,
            draft_reply: record.draft.current,
            can_undo,
            error_message: record.error_message,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDraftRequest {
    pub draft: Option<String>,
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid document ID".into()))
}

/// `POST /api/documents`: multipart upload, field `file`.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentView>), ApiError> {
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("").to_string();
        let mime_type = field.content_type().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {e}")))?;
        file = Some(UploadedFile {
            file_name,
            mime_type,
            bytes: bytes.to_vec(),
        });
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    let record = ctx.core.ingestor.ingest(&caller.owner, file).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// `GET /api/documents[?q=]`: newest first, optionally filtered.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DocumentView>>, ApiError> {
    let records = ctx
        .core
        .ingestor
        .search(&caller.owner, query.q.as_deref())
        .await?;
    Ok(Json(records.into_iter().map(DocumentView::from).collect()))
}

/// `GET /api/documents/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, ApiError> {
    let id = parse_id(&id)?;
    let record = ctx
        .core
        .ingestor
        .get(&caller.owner, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {id}")))?;
    Ok(Json(record.into()))
}

/// `DELETE /api/documents/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if ctx.core.ingestor.delete(&caller.owner, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Document {id}")))
    }
}

/// `GET /api/documents/:id/original`: raw uploaded bytes.
pub async fn original(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let original = ctx
        .core
        .ingestor
        .original(&caller.owner, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {id}")))?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        sanitize_file_name(&original.file_name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, original.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        original.bytes,
    )
        .into_response())
}

/// `POST /api/documents/:id/draft/apply`: `{draft}`; a null or blank
/// draft leaves the record unchanged.
pub async fn apply_draft(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<ApplyDraftRequest>,
) -> Result<Json<DocumentView>, ApiError> {
    let id = parse_id(&id)?;
    let record = ctx
        .core
        .drafts
        .apply(&caller.owner, &id, body.draft.as_deref())
        .await?;
    Ok(Json(record.into()))
}

/// `POST /api/documents/:id/draft/undo`
pub async fn undo_draft(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, ApiError> {
    let id = parse_id(&id)?;
    let record = ctx.core.drafts.undo(&caller.owner, &id).await?;
    Ok(Json(record.into()))
}
