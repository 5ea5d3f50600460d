pub mod blob;
pub mod format;

pub use blob::*;
pub use format::*;

use thiserror::Error;

/// Upload rejected before any storage or network call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("File name is empty")]
    EmptyFileName,

    #[error("File has no MIME type")]
    MissingMimeType,

    #[error("Unsupported file type '{0}'; accepted: pdf, jpg, jpeg, png, webp")]
    UnsupportedExtension(String),

    #[error("MIME type '{mime_type}' does not match file extension '{extension}'")]
    MimeMismatch { extension: String, mime_type: String },

    #[error("HEIC/HEIF images are not supported; please convert to JPEG or PNG")]
    HeicNotSupported,

    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb:.1}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: f64 },
}

/// Blob store write/read failure.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob already exists: {0}")]
    AlreadyExists(String),

    #[error("Unsafe storage path: {0}")]
    UnsafePath(String),
}
