use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const DOCUMENT_COLUMNS: &str = "id, owner_id, storage_bucket, storage_path, file_name, mime_type,
     status, ocr_text, analysis, draft_reply, draft_checkpoint, has_checkpoint,
     error_message, created_at, updated_at";

pub fn insert_document(conn: &Connection, doc: &DocumentRecord) -> Result<(), DatabaseError> {
    let (checkpoint, has_checkpoint) = checkpoint_columns(&doc.draft);
    conn.execute(
        "INSERT INTO documents (id, owner_id, storage_bucket, storage_path, file_name, mime_type,
         status, ocr_text, analysis, draft_reply, draft_checkpoint, has_checkpoint,
         error_message, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            doc.id.to_string(),
            doc.owner_id.as_str(),
            doc.storage_ref.bucket,
            doc.storage_ref.path,
            doc.file_name,
            doc.mime_type,
            doc.status.as_str(),
            doc.ocr_text,
            doc.analysis.as_ref().map(serde_json::to_string).transpose()?,
            doc.draft.current,
            checkpoint,
            has_checkpoint,
            doc.error_message,
            format_timestamp(&doc.created_at),
            format_timestamp(&doc.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_document(
    conn: &Connection,
    owner: &OwnerId,
    id: &Uuid,
) -> Result<Option<DocumentRecord>, DatabaseError> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1 AND owner_id = ?2");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(params![id.to_string(), owner.as_str()], read_row)
        .optional()?;
    row.map(document_from_row).transpose()
}

/// All documents of one owner, newest first.
pub fn list_documents(
    conn: &Connection,
    owner: &OwnerId,
) -> Result<Vec<DocumentRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner.as_str()], read_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Case-insensitive substring search over file name, OCR text, detected
/// analysis values and error message. Matching runs on the decoded values
/// with Unicode lowercasing, so JSON key names and the "not detected"
/// sentinel never match. An empty query lists everything.
pub fn search_documents(
    conn: &Connection,
    owner: &OwnerId,
    query: &str,
) -> Result<Vec<DocumentRecord>, DatabaseError> {
    let needle = query.trim().to_lowercase();
    let docs = list_documents(conn, owner)?;
    if needle.is_empty() {
        return Ok(docs);
    }
    Ok(docs
        .into_iter()
        .filter(|doc| searchable_values(doc).any(|v| v.to_lowercase().contains(&needle)))
        .collect())
}

fn searchable_values(doc: &DocumentRecord) -> impl Iterator<Item = &str> {
    [
        Some(doc.file_name.as_str()),
        doc.ocr_text.as_deref(),
        doc.error_message.as_deref(),
    ]
    .into_iter()
    .flatten()
    .chain(doc.analysis.iter().flat_map(LetterAnalysis::detected_values))
}

/// Move a non-terminal record to `completed` with its analysis and first draft.
pub fn complete_document(
    conn: &Connection,
    owner: &OwnerId,
    id: &Uuid,
    ocr_text: Option<&str>,
    analysis: &LetterAnalysis,
    draft: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET status = 'completed', ocr_text = ?3, analysis = ?4,
         draft_reply = ?5, draft_checkpoint = NULL, has_checkpoint = 0,
         error_message = NULL, updated_at = ?6
         WHERE id = ?1 AND owner_id = ?2 AND status IN ('pending', 'processing')",
        params![
            id.to_string(),
            owner.as_str(),
            ocr_text,
            serde_json::to_string(analysis)?,
            draft,
            format_timestamp(&Utc::now()),
        ],
    )?;
    if rows == 0 {
        return Err(explain_rejected_transition(
            conn,
            owner,
            id,
            DocumentStatus::Completed,
        ));
    }
    Ok(())
}

/// Move a non-terminal record to `failed`. Text, analysis and draft stay empty.
pub fn fail_document(
    conn: &Connection,
    owner: &OwnerId,
    id: &Uuid,
    error_message: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET status = 'failed', error_message = ?3, updated_at = ?4
         WHERE id = ?1 AND owner_id = ?2 AND status IN ('pending', 'processing')",
        params![
            id.to_string(),
            owner.as_str(),
            error_message,
            format_timestamp(&Utc::now()),
        ],
    )?;
    if rows == 0 {
        return Err(explain_rejected_transition(
            conn,
            owner,
            id,
            DocumentStatus::Failed,
        ));
    }
    Ok(())
}

/// Persist the draft slot (current draft + undo checkpoint). Status is untouched.
pub fn save_draft(
    conn: &Connection,
    owner: &OwnerId,
    id: &Uuid,
    draft: &DraftSlot,
) -> Result<(), DatabaseError> {
    let (checkpoint, has_checkpoint) = checkpoint_columns(draft);
    let rows = conn.execute(
        "UPDATE documents SET draft_reply = ?3, draft_checkpoint = ?4, has_checkpoint = ?5,
         updated_at = ?6
         WHERE id = ?1 AND owner_id = ?2",
        params![
            id.to_string(),
            owner.as_str(),
            draft.current,
            checkpoint,
            has_checkpoint,
            format_timestamp(&Utc::now()),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Delete one record of the owner. Returns whether a row was removed.
pub fn delete_document(
    conn: &Connection,
    owner: &OwnerId,
    id: &Uuid,
) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM documents WHERE id = ?1 AND owner_id = ?2",
        params![id.to_string(), owner.as_str()],
    )?;
    if deleted > 0 {
        tracing::info!(document_id = %id, owner = %owner, "Document deleted");
    }
    Ok(deleted > 0)
}

fn explain_rejected_transition(
    conn: &Connection,
    owner: &OwnerId,
    id: &Uuid,
    target: DocumentStatus,
) -> DatabaseError {
    let current: Result<Option<String>, rusqlite::Error> = conn
        .query_row(
            "SELECT status FROM documents WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner.as_str()],
            |row| row.get(0),
        )
        .optional();

    match current {
        Ok(Some(status)) => DatabaseError::InvalidTransition {
            id: id.to_string(),
            from: status,
            to: target.as_str().into(),
        },
        Ok(None) => DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: id.to_string(),
        },
        Err(e) => e.into(),
    }
}

fn checkpoint_columns(draft: &DraftSlot) -> (Option<String>, i32) {
    match &draft.checkpoint {
        Some(previous) => (previous.clone(), 1),
        None => (None, 0),
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw}: {e}")))
}

// Internal row type for DocumentRecord mapping
struct DocumentRow {
    id: String,
    owner_id: String,
    storage_bucket: String,
    storage_path: String,
    file_name: String,
    mime_type: String,
    status: String,
    ocr_text: Option<String>,
    analysis: Option<String>,
    draft_reply: Option<String>,
    draft_checkpoint: Option<String>,
    has_checkpoint: i32,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        storage_bucket: row.get(2)?,
        storage_path: row.get(3)?,
        file_name: row.get(4)?,
        mime_type: row.get(5)?,
        status: row.get(6)?,
        ocr_text: row.get(7)?,
        analysis: row.get(8)?,
        draft_reply: row.get(9)?,
        draft_checkpoint: row.get(10)?,
        has_checkpoint: row.get(11)?,
        error_message: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<DocumentRecord, DatabaseError> {
    let owner_id = OwnerId::parse(&row.owner_id)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("owner_id: {e}")))?;
    let analysis = row
        .analysis
        .as_deref()
        .map(serde_json::from_str::<LetterAnalysis>)
        .transpose()?;
    let checkpoint = if row.has_checkpoint != 0 {
        Some(row.draft_checkpoint)
    } else {
        None
    };

    Ok(DocumentRecord {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        owner_id,
        storage_ref: StorageRef {
            bucket: row.storage_bucket,
            path: row.storage_path,
        },
        file_name: row.file_name,
        mime_type: row.mime_type,
        status: DocumentStatus::from_str(&row.status)?,
        ocr_text: row.ocr_text,
        analysis,
        draft: DraftSlot {
            current: row.draft_reply,
            checkpoint,
        },
        error_message: row.error_message,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}
