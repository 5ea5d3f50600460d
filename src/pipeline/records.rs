//! Record store seam between the pipeline and persistence.
//!
//! The pipeline only sees [`RecordStore`]; the SQLite implementation wraps
//! the owner-scoped repository functions behind a connection mutex. The lock
//! is never held across an await point.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{DocumentRecord, DraftSlot, LetterAnalysis, OwnerId};

#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Document {id} cannot move from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Record store lock poisoned")]
    LockPoisoned,
}

impl RecordStoreError {
    fn from_db(id: &Uuid, err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { .. } => Self::NotFound(*id),
            DatabaseError::InvalidTransition { from, to, .. } => Self::InvalidTransition {
                id: *id,
                from,
                to,
            },
            other => Self::Database(other),
        }
    }
}

impl From<DatabaseError> for RecordStoreError {
    fn from(err: DatabaseError) -> Self {
        Self::Database(err)
    }
}

/// Owner-scoped document persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &DocumentRecord) -> Result<(), RecordStoreError>;

    async fn get(&self, owner: &OwnerId, id: &Uuid)
        -> Result<Option<DocumentRecord>, RecordStoreError>;

    async fn list(&self, owner: &OwnerId) -> Result<Vec<DocumentRecord>, RecordStoreError>;

    async fn search(
        &self,
        owner: &OwnerId,
        query: &str,
    ) -> Result<Vec<DocumentRecord>, RecordStoreError>;

    /// Non-terminal → completed, with analysis and draft.
    async fn complete(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        ocr_text: Option<&str>,
        analysis: &LetterAnalysis,
        draft: &str,
    ) -> Result<(), RecordStoreError>;

    /// Non-terminal → failed, with an error message.
    async fn fail(&self, owner: &OwnerId, id: &Uuid, message: &str)
        -> Result<(), RecordStoreError>;

    async fn save_draft(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        draft: &DraftSlot,
    ) -> Result<(), RecordStoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, owner: &OwnerId, id: &Uuid) -> Result<bool, RecordStoreError>;
}

/// [`RecordStore`] over one SQLite connection.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_memory_database()?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RecordStoreError> {
        self.conn.lock().map_err(|_| RecordStoreError::LockPoisoned)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &DocumentRecord) -> Result<(), RecordStoreError> {
        let conn = self.conn()?;
        db::insert_document(&conn, record).map_err(|e| RecordStoreError::from_db(&record.id, e))
    }

    async fn get(
        &self,
        owner: &OwnerId,
        id: &Uuid,
    ) -> Result<Option<DocumentRecord>, RecordStoreError> {
        let conn = self.conn()?;
        Ok(db::get_document(&conn, owner, id)?)
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<DocumentRecord>, RecordStoreError> {
        let conn = self.conn()?;
        Ok(db::list_documents(&conn, owner)?)
    }

    async fn search(
        &self,
        owner: &OwnerId,
        query: &str,
    ) -> Result<Vec<DocumentRecord>, RecordStoreError> {
        let conn = self.conn()?;
        Ok(db::search_documents(&conn, owner, query)?)
    }

    async fn complete(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        ocr_text: Option<&str>,
        analysis: &LetterAnalysis,
        draft: &str,
    ) -> Result<(), RecordStoreError> {
        let conn = self.conn()?;
        db::complete_document(&conn, owner, id, ocr_text, analysis, draft)
            .map_err(|e| RecordStoreError::from_db(id, e))
    }

    async fn fail(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        message: &str,
    ) -> Result<(), RecordStoreError> {
        let conn = self.conn()?;
        db::fail_document(&conn, owner, id, message).map_err(|e| RecordStoreError::from_db(id, e))
    }

    async fn save_draft(
        &self,
        owner: &OwnerId,
        id: &Uuid,
        draft: &DraftSlot,
    ) -> Result<(), RecordStoreError> {
        let conn = self.conn()?;
        db::save_draft(&conn, owner, id, draft).map_err(|e| RecordStoreError::from_db(id, e))
    }

    async fn delete(&self, owner: &OwnerId, id: &Uuid) -> Result<bool, RecordStoreError> {
        let conn = self.conn()?;
        Ok(db::delete_document(&conn, owner, id)?)
    }
}
