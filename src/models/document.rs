use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DocumentStatus;
use super::owner::OwnerId;

/// Sentinel for a header field the analyzer could not find.
pub const NOT_DETECTED: &str = "Not detected";

/// Pointer to a stored raw upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    pub bucket: String,
    pub path: String,
}

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

/// Structured fields extracted from a letter. Every field is always present;
/// missing header values hold [`NOT_DETECTED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterAnalysis {
    pub document_type: String,
    pub sender: String,
    pub recipient: String,
    pub date: String,
    pub subject: String,
    pub full_text: String,
}

impl LetterAnalysis {
    /// Analysis with no detected header and no text.
    pub fn empty() -> Self {
        Self::undetected(String::new())
    }

    /// Header values that were actually detected, then the full text.
    pub fn detected_values(&self) -> impl Iterator<Item = &str> {
        [
            self.document_type.as_str(),
            self.sender.as_str(),
            self.recipient.as_str(),
            self.date.as_str(),
            self.subject.as_str(),
            self.full_text.as_str(),
        ]
        .into_iter()
        .filter(|v| !v.trim().is_empty() && *v != NOT_DETECTED)
    }

    /// Analysis where only the raw text is known.
    pub fn undetected(full_text: String) -> Self {
        Self {
            document_type: NOT_DETECTED.to_string(),
            sender: NOT_DETECTED.to_string(),
            recipient: NOT_DETECTED.to_string(),
            date: NOT_DETECTED.to_string(),
            subject: NOT_DETECTED.to_string(),
            full_text,
        }
    }
}

/// The single active draft of a record plus its one-level undo checkpoint.
///
/// `checkpoint` is `Some(previous)` right after an apply, where `previous`
/// may itself be `None` when no draft existed before.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSlot {
    pub current: Option<String>,
    pub checkpoint: Option<Option<String>>,
}

impl DraftSlot {
    pub fn new(current: Option<String>) -> Self {
        Self {
            current,
            checkpoint: None,
        }
    }

    /// Replace the current draft, remembering the old one. A blank
    /// suggestion is not a suggestion; returns whether anything changed.
    pub fn apply(&mut self, suggestion: &str) -> bool {
        if suggestion.trim().is_empty() {
            return false;
        }
        let previous = self.current.replace(suggestion.to_string());
        self.checkpoint = Some(previous);
        true
    }

    /// Restore the checkpoint and clear it; no-op without one.
    pub fn undo(&mut self) -> bool {
        match self.checkpoint.take() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.checkpoint.is_some()
    }
}

/// A user's uploaded letter and everything derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub storage_ref: StorageRef,
    pub file_name: String,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub ocr_text: Option<String>,
    pub analysis: Option<LetterAnalysis>,
    pub draft: DraftSlot,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Fresh record right after the blob landed.
    pub fn new(
        id: Uuid,
        owner_id: OwnerId,
        storage_ref: StorageRef,
        file_name: String,
        mime_type: String,
        status: DocumentStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            storage_ref,
            file_name,
            mime_type,
            status,
            ocr_text: None,
            analysis: None,
            draft: DraftSlot::default(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn draft_reply(&self) -> Option<&str> {
        self.draft.current.as_deref()
    }

    /// `completed ⇒ analysis ∧ draft`, `failed ⇒ error_message`.
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            DocumentStatus::Completed => self.analysis.is_some() && self.draft.current.is_some(),
            DocumentStatus::Failed => self.error_message.is_some(),
            DocumentStatus::Pending | DocumentStatus::Processing => true,
        }
    }
}
