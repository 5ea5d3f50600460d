use std::sync::Arc;

use uuid::Uuid;

use super::ChatError;
use crate::models::{DocumentRecord, OwnerId};
use crate::pipeline::records::RecordStore;

/// Applies chat-suggested drafts to a record with one level of undo.
///
/// Two concurrent applies on the same document race: last write wins and
/// the checkpoint reflects whichever write landed first.
pub struct DraftEditor {
    records: Arc<dyn RecordStore>,
}

impl DraftEditor {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Replace the draft with `suggestion`, keeping the old one as the undo
    /// checkpoint. No suggestion (or a blank one) leaves the record as is.
    pub async fn apply(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        suggestion: Option<&str>,
    ) -> Result<DocumentRecord, ChatError> {
        let mut record = self.load(owner, id).await?;
        let Some(suggestion) = suggestion else {
            return Ok(record);
        };
        if !record.draft.apply(suggestion) {
            return Ok(record);
        }

        self.records.save_draft(owner, id, &record.draft).await?;
        tracing::info!(
            document_id = %id,
            draft_len = suggestion.len(),
            "Suggested draft applied"
        );
        self.load(owner, id).await
    }

    /// Restore the checkpoint. Without one, this is a no-op.
    pub async fn undo(&self, owner: &OwnerId, id: &Uuid) -> Result<DocumentRecord, ChatError> {
        let mut record = self.load(owner, id).await?;
        if !record.draft.undo() {
            return Ok(record);
        }

        self.records.save_draft(owner, id, &record.draft).await?;
        tracing::info!(document_id = %id, "Draft change undone");
        self.load(owner, id).await
    }

    async fn load(&self, owner: &OwnerId, id: &Uuid) -> Result<DocumentRecord, ChatError> {
        self.records
            .get(owner, id)
            .await?
            .ok_or(ChatError::DocumentNotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentStatus, LetterAnalysis, StorageRef};
    use crate::pipeline::records::SqliteRecordStore;

    async fn setup(initial_draft: &str) -> (Arc<SqliteRecordStore>, DraftEditor, OwnerId, Uuid) {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let owner = OwnerId::parse("jdoe").unwrap();
        let id = Uuid::new_v4();
        let record = DocumentRecord::new(
            id,
            owner.clone(),
            StorageRef {
                bucket: "originals".into(),
                path: format!("jdoe/{id}_scan.jpg"),
            },
            "scan.jpg".into(),
            "image/jpeg".into(),
            DocumentStatus::Processing,
        );
        store.insert(&record).await.unwrap();
        store
            .complete(&owner, &id, Some("text"), &LetterAnalysis::empty(), initial_draft)
            .await
            .unwrap();
        let editor = DraftEditor::new(store.clone());
        (store, editor, owner, id)
    }

    #[tokio::test]
    async fn apply_then_undo_round_trip() {
        let (_, editor, owner, id) = setup("D0").await;

        let applied = editor.apply(&owner, &id, Some("D1")).await.unwrap();
        assert_eq!(applied.draft_reply(), Some("D1"));
        assert!(applied.draft.can_undo());

        let undone = editor.undo(&owner, &id).await.unwrap();
        assert_eq!(undone.draft_reply(), Some("D0"));

        let again = editor.undo(&owner, &id).await.unwrap();
        assert_eq!(again.draft_reply(), Some("D0"));
        assert!(!again.draft.can_undo());
    }

    #[tokio::test]
    async fn only_one_level_of_undo() {
        let (_, editor, owner, id) = setup("D0").await;
        editor.apply(&owner, &id, Some("D1")).await.unwrap();
        editor.apply(&owner, &id, Some("D2")).await.unwrap();

        let undone = editor.undo(&owner, &id).await.unwrap();
        assert_eq!(undone.draft_reply(), Some("D1"));
    }

    #[tokio::test]
    async fn apply_without_suggestion_is_noop() {
        let (_, editor, owner, id) = setup("D0").await;
        let unchanged = editor.apply(&owner, &id, None).await.unwrap();
        assert_eq!(unchanged.draft_reply(), Some("D0"));
        assert!(!unchanged.draft.can_undo());

        let unchanged = editor.apply(&owner, &id, Some("  ")).await.unwrap();
        assert_eq!(unchanged.draft_reply(), Some("D0"));
    }

    #[tokio::test]
    async fn status_is_untouched_by_apply() {
        let (store, editor, owner, id) = setup("D0").await;
        editor.apply(&owner, &id, Some("D1")).await.unwrap();
        let stored = store.get(&owner, &id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert!(stored.invariants_hold());
    }

    #[tokio::test]
    async fn other_owner_cannot_apply() {
        let (_, editor, _, id) = setup("D0").await;
        let mallory = OwnerId::parse("mallory").unwrap();
        let err = editor.apply(&mallory, &id, Some("X")).await.unwrap_err();
        assert!(matches!(err, ChatError::DocumentNotFound(_)));
    }
}
