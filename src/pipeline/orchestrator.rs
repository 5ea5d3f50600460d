//! Ingestion orchestrator: validate → store blob → create record → analyze
//! → terminal update.
//!
//! Each step is strictly sequential. Validation runs before any side effect;
//! a storage failure aborts before a record exists; an analysis failure is
//! recorded on the document as `failed`. Only a record store that refuses
//! the `failed` write twice turns it into an error.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use super::draft::compose;
use super::extraction::{to_data_url, LetterAnalyzer};
use super::import::{canonical_mime, validate_upload, BlobStore, StorageError, ValidationError};
use super::records::{RecordStore, RecordStoreError};
use crate::models::{DocumentRecord, DocumentStatus, LetterAnalysis, OwnerId};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record store error: {0}")]
    Records(#[from] RecordStoreError),
}

/// One uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Raw blob of a record, for re-display.
#[derive(Debug, Clone)]
pub struct OriginalFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct Ingestor {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    analyzer: Arc<dyn LetterAnalyzer>,
    max_upload_bytes: u64,
}

impl Ingestor {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        analyzer: Arc<dyn LetterAnalyzer>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            blobs,
            records,
            analyzer,
            max_upload_bytes,
        }
    }

    /// Run one upload to a terminal record state and return that record.
    pub async fn ingest(
        &self,
        owner: &OwnerId,
        file: UploadedFile,
    ) -> Result<DocumentRecord, IngestError> {
        let upload = validate_upload(
            &file.file_name,
            &file.mime_type,
            &file.bytes,
            self.max_upload_bytes,
        )
        .inspect_err(|e| {
            tracing::info!(owner = %owner, error = %e, "Upload rejected");
        })?;

        let mime_type = if upload.mime_type == "application/octet-stream" {
            canonical_mime(&upload.extension)
        } else {
            upload.mime_type.clone()
        };

        let id = Uuid::new_v4();
        let start = std::time::Instant::now();
        tracing::info!(
            document_id = %id,
            owner = %owner,
            kind = upload.kind.as_str(),
            size = file.bytes.len(),
            "Ingestion started"
        );

        let storage_ref = self
            .blobs
            .put(owner, &id, &file.file_name, &file.bytes)
            .await
            .inspect_err(|e| {
                tracing::warn!(document_id = %id, error = %e, "Blob write failed");
            })?;

        let initial_status = if upload.kind.needs_analysis() {
            DocumentStatus::Processing
        } else {
            DocumentStatus::Pending
        };
        let record = DocumentRecord::new(
            id,
            owner.clone(),
            storage_ref.clone(),
            file.file_name.trim().to_string(),
            mime_type.clone(),
            initial_status,
        );
        if let Err(e) = self.records.insert(&record).await {
            tracing::warn!(document_id = %id, error = %e, "Record insert failed, removing blob");
            if let Err(cleanup) = self.blobs.delete(&storage_ref).await {
                tracing::warn!(document_id = %id, error = %cleanup, "Orphan blob left behind");
            }
            return Err(e.into());
        }

        if upload.kind.needs_analysis() {
            self.analyze_and_finish(owner, &id, &mime_type, &file.bytes)
                .await?;
        } else {
            let analysis = LetterAnalysis::empty();
            self.records
                .complete(owner, &id, None, &analysis, &compose(&analysis))
                .await?;
        }

        let stored = self
            .records
            .get(owner, &id)
            .await?
            .ok_or(RecordStoreError::NotFound(id))?;

        tracing::info!(
            document_id = %id,
            status = %stored.status,
            elapsed_ms = %start.elapsed().as_millis(),
            "Ingestion finished"
        );
        Ok(stored)
    }

    async fn analyze_and_finish(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<(), IngestError> {
        let data_url = to_data_url(mime_type, bytes);
        match self.analyzer.analyze(&data_url, mime_type).await {
            Ok(analysis) => {
                let draft = compose(&analysis);
                let completed = self
                    .records
                    .complete(owner, id, Some(&analysis.full_text), &analysis, &draft)
                    .await;
                if let Err(e) = completed {
                    tracing::warn!(document_id = %id, error = %e, "Completion write failed");
                    self.mark_failed(owner, id, "Analysis result could not be saved")
                        .await?;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "Letter analysis failed");
                self.mark_failed(owner, id, &e.to_string()).await
            }
        }
    }

    /// Write the `failed` state, retrying once. If both writes fail the
    /// record stays in `processing` and the second error is returned.
    async fn mark_failed(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        message: &str,
    ) -> Result<(), IngestError> {
        let Err(first) = self.records.fail(owner, id, message).await else {
            return Ok(());
        };
        tracing::warn!(document_id = %id, error = %first, "Failure write failed, retrying");
        self.records.fail(owner, id, message).await.inspect_err(|e| {
            tracing::error!(
                document_id = %id,
                first_error = %first,
                error = %e,
                "Record left in processing"
            );
        })?;
        Ok(())
    }

    pub async fn get(
        &self,
        owner: &OwnerId,
        id: &Uuid,
    ) -> Result<Option<DocumentRecord>, IngestError> {
        Ok(self.records.get(owner, id).await?)
    }

    /// Newest first; a blank query lists everything.
    pub async fn search(
        &self,
        owner: &OwnerId,
        query: Option<&str>,
    ) -> Result<Vec<DocumentRecord>, IngestError> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => Ok(self.records.search(owner, q).await?),
            None => Ok(self.records.list(owner).await?),
        }
    }

    /// Remove the record, then its blob. A blob that cannot be removed is
    /// logged and left; the record is already gone.
    pub async fn delete(&self, owner: &OwnerId, id: &Uuid) -> Result<bool, IngestError> {
        let Some(record) = self.records.get(owner, id).await? else {
            return Ok(false);
        };
        if !self.records.delete(owner, id).await? {
            return Ok(false);
        }
        if let Err(e) = self.blobs.delete(&record.storage_ref).await {
            tracing::warn!(
                document_id = %id,
                storage_ref = %record.storage_ref,
                error = %e,
                "Blob delete failed after record removal"
            );
        }
        Ok(true)
    }

    /// Raw upload of one of the owner's records.
    pub async fn original(
        &self,
        owner: &OwnerId,
        id: &Uuid,
    ) -> Result<Option<OriginalFile>, IngestError> {
        let Some(record) = self.records.get(owner, id).await? else {
            return Ok(None);
        };
        let bytes = self.blobs.get(&record.storage_ref).await?;
        Ok(Some(OriginalFile {
            file_name: record.file_name,
            mime_type: record.mime_type,
            bytes,
        }))
    }
}
