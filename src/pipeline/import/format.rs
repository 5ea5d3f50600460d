use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Upload categories the pipeline accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Pdf,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }

    /// Only images go through vision extraction.
    pub fn needs_analysis(&self) -> bool {
        matches!(self, Self::Image)
    }
}

const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "webp"];
const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];

/// ISO-BMFF major brands used by HEIC/HEIF stills and sequences.
const HEIC_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

/// An upload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub kind: FileKind,
    pub extension: String,
    pub mime_type: String,
}

/// Check name, MIME type, size and content before anything is stored.
pub fn validate_upload(
    file_name: &str,
    mime_type: &str,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<ValidatedUpload, ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::EmptyFileName);
    }
    let mime_type = mime_type.trim().to_ascii_lowercase();
    if mime_type.is_empty() {
        return Err(ValidationError::MissingMimeType);
    }

    let extension = Path::new(file_name.trim())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if HEIC_EXTENSIONS.contains(&extension.as_str())
        || mime_type == "image/heic"
        || mime_type == "image/heif"
    {
        return Err(ValidationError::HeicNotSupported);
    }
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        let shown = if extension.is_empty() {
            "(none)".to_string()
        } else {
            extension
        };
        return Err(ValidationError::UnsupportedExtension(shown));
    }

    let kind = if extension == "pdf" {
        FileKind::Pdf
    } else {
        FileKind::Image
    };
    if !mime_matches(&extension, &mime_type) {
        return Err(ValidationError::MimeMismatch {
            extension,
            mime_type,
        });
    }

    if bytes.is_empty() {
        return Err(ValidationError::EmptyFile);
    }
    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size_mb: size as f64 / (1024.0 * 1024.0),
            max_mb: max_bytes as f64 / (1024.0 * 1024.0),
        });
    }
    if is_heic_payload(bytes) {
        return Err(ValidationError::HeicNotSupported);
    }

    Ok(ValidatedUpload {
        kind,
        extension,
        mime_type,
    })
}

/// Browsers send `application/octet-stream` for unknown types; accept it and
/// trust the extension. Otherwise the MIME type must be one mime_guess maps
/// the extension to.
fn mime_matches(extension: &str, mime_type: &str) -> bool {
    if mime_type == "application/octet-stream" {
        return true;
    }
    mime_guess::from_ext(extension)
        .iter()
        .any(|guess| guess.essence_str() == mime_type)
        || (matches!(extension, "jpg" | "jpeg") && mime_type == "image/jpg")
}

/// MIME type to store for an accepted extension.
pub fn canonical_mime(extension: &str) -> String {
    mime_guess::from_ext(extension)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// HEIC/HEIF files are ISO-BMFF: `ftyp` box at offset 4, major brand after it.
pub fn is_heic_payload(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    HEIC_BRANDS.iter().any(|brand| &bytes[8..12] == brand.as_slice())
}

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// Reduce a file name to `[A-Za-z0-9_]` plus one `.` before the extension.
pub fn sanitize_file_name(file_name: &str) -> String {
    let path = Path::new(file_name.trim());
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|e| e.to_str());

    let clean_stem = UNSAFE_CHARS.replace_all(stem, "_");
    let clean_stem = clean_stem.trim_matches('_');
    let clean_stem = if clean_stem.is_empty() {
        "file"
    } else {
        clean_stem
    };

    match extension {
        Some(ext) => {
            let clean_ext = UNSAFE_CHARS.replace_all(ext, "_").to_ascii_lowercase();
            format!("{clean_stem}.{clean_ext}")
        }
        None => clean_stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 20 * 1024 * 1024;
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    fn heic_bytes(brand: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(brand);
        bytes.extend_from_slice(&[0; 12]);
        bytes
    }

    #[test]
    fn accepts_jpeg() {
        let upload = validate_upload("scan.jpg", "image/jpeg", JPEG, MAX).unwrap();
        assert_eq!(upload.kind, FileKind::Image);
        assert_eq!(upload.extension, "jpg");
    }

    #[test]
    fn accepts_pdf_as_non_image() {
        let upload = validate_upload("Bescheid.PDF", "application/pdf", b"%PDF-1.7", MAX).unwrap();
        assert_eq!(upload.kind, FileKind::Pdf);
        assert!(!upload.kind.needs_analysis());
    }

    #[test]
    fn accepts_png_and_webp() {
        assert!(validate_upload("a.png", "image/png", b"\x89PNG", MAX).is_ok());
        assert!(validate_upload("a.webp", "image/webp", b"RIFF", MAX).is_ok());
    }

    #[test]
    fn heic_extension_rejected() {
        let err = validate_upload("photo.heic", "image/heic", JPEG, MAX).unwrap_err();
        assert_eq!(err, ValidationError::HeicNotSupported);
    }

    #[test]
    fn heic_payload_rejected_under_jpg_name() {
        let err = validate_upload("photo.jpg", "image/jpeg", &heic_bytes(b"heic"), MAX).unwrap_err();
        assert_eq!(err, ValidationError::HeicNotSupported);
    }

    #[test]
    fn non_heic_iso_bmff_is_not_heic() {
        assert!(!is_heic_payload(&heic_bytes(b"isom")));
        assert!(is_heic_payload(&heic_bytes(b"mif1")));
        assert!(!is_heic_payload(b"ftyp"));
    }

    #[test]
    fn empty_name_and_mime_rejected() {
        assert_eq!(
            validate_upload("  ", "image/png", JPEG, MAX).unwrap_err(),
            ValidationError::EmptyFileName
        );
        assert_eq!(
            validate_upload("a.png", "", JPEG, MAX).unwrap_err(),
            ValidationError::MissingMimeType
        );
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = validate_upload("notes.docx", "application/msword", JPEG, MAX).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedExtension("docx".into()));
        let err = validate_upload("README", "text/plain", JPEG, MAX).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedExtension("(none)".into()));
    }

    #[test]
    fn mismatched_mime_rejected_octet_stream_allowed() {
        assert!(matches!(
            validate_upload("scan.jpg", "application/pdf", JPEG, MAX),
            Err(ValidationError::MimeMismatch { .. })
        ));
        assert!(validate_upload("scan.jpg", "application/octet-stream", JPEG, MAX).is_ok());
    }

    #[test]
    fn empty_and_oversized_rejected() {
        assert_eq!(
            validate_upload("a.png", "image/png", &[], MAX).unwrap_err(),
            ValidationError::EmptyFile
        );
        assert!(matches!(
            validate_upload("a.png", "image/png", &[0u8; 11], 10),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn oversized_upload_reports_sizes_in_megabytes() {
        let bytes = vec![0u8; 2 * 1024 * 1024];
        let err = validate_upload("a.png", "image/png", &bytes, 1024 * 1024).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FileTooLarge {
                size_mb: 2.0,
                max_mb: 1.0,
            }
        );
        assert_eq!(err.clone(), err);
        assert!(err.to_string().contains("2.0MB exceeds 1.0MB"));
    }

    #[test]
    fn sanitize_collapses_unsafe_characters() {
        assert_eq!(sanitize_file_name("Mein Brief (1).JPG"), "Mein_Brief_1.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("Bescheid ÄÖÜ.pdf"), "Bescheid.pdf");
        assert_eq!(sanitize_file_name("...png"), "file.png");
    }

    #[test]
    fn canonical_mime_for_accepted_extensions() {
        assert_eq!(canonical_mime("jpg"), "image/jpeg");
        assert_eq!(canonical_mime("pdf"), "application/pdf");
        assert_eq!(canonical_mime("png"), "image/png");
    }
}
