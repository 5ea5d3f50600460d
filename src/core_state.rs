//! Shared application state: the pipeline collaborators, wired once at
//! startup and shared by every request handler behind an `Arc`.

use std::sync::Arc;

use thiserror::Error;

use crate::config::AppConfig;
use crate::db::DatabaseError;
use crate::pipeline::chat::{ChatService, DraftEditor};
use crate::pipeline::extraction::{LetterAnalyzer, VisionLetterAnalyzer};
use crate::pipeline::import::{BlobStore, FsBlobStore};
use crate::pipeline::ollama::{OllamaClient, OllamaError};
use crate::pipeline::orchestrator::Ingestor;
use crate::pipeline::records::{RecordStore, SqliteRecordStore};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Model client error: {0}")]
    Ollama(#[from] OllamaError),
}

pub struct CoreState {
    pub config: AppConfig,
    pub ingestor: Ingestor,
    pub drafts: DraftEditor,
    pub chat: Arc<dyn ChatService>,
}

impl CoreState {
    /// Production wiring: SQLite under `data_dir`, filesystem blobs, Ollama
    /// for both vision and chat.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let records: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::open(&config.database_path())?);
        let blobs: Arc<dyn BlobStore> =
            Arc::new(FsBlobStore::new(config.blob_root(), &config.blob_bucket));
        let ollama = Arc::new(OllamaClient::new(
            &config.ollama_url,
            config.request_timeout_secs,
            &config.chat_model,
        )?);
        let analyzer: Arc<dyn LetterAnalyzer> =
            Arc::new(VisionLetterAnalyzer::new(ollama.clone(), &config.vision_model));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            ollama_url = %config.ollama_url,
            vision_model = %config.vision_model,
            chat_model = %config.chat_model,
            "Core state initialized"
        );
        Ok(Self::with_collaborators(config, records, blobs, analyzer, ollama))
    }

    /// Wire arbitrary collaborators (tests, alternative backends).
    pub fn with_collaborators(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        analyzer: Arc<dyn LetterAnalyzer>,
        chat: Arc<dyn ChatService>,
    ) -> Self {
        let ingestor = Ingestor::new(blobs, records.clone(), analyzer, config.max_upload_bytes);
        let drafts = DraftEditor::new(records);
        Self {
            config,
            ingestor,
            drafts,
            chat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_creates_database_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let state = CoreState::from_config(config).unwrap();
        assert!(state.config.database_path().exists());
    }
}
