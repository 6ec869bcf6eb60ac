//! Input validation: make sure a path names a readable PDF before pdfium
//! touches it.
//!
//! ## Why check the signature ourselves?
//!
//! pdfium reports a non-PDF as a generic format error. Checking the `%PDF`
//! magic bytes first lets callers tell "this upload is not a PDF" apart from
//! missing files and permission problems.

use crate::error::ExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The canonical PDF file signature.
pub const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Whether `bytes` begin with the PDF signature.
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
}

/// Validate a local file path: exists, readable, starts with `%PDF`.
pub fn validate_pdf_path(path: &Path) -> Result<PathBuf, ExtractError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ExtractError::InvalidDocument {
            path,
            detail: "path is a directory".into(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut magic = Vec::with_capacity(PDF_SIGNATURE.len());
            f.take(PDF_SIGNATURE.len() as u64)
                .read_to_end(&mut magic)
                .map_err(|e| ExtractError::InvalidDocument {
                    path: path.clone(),
                    detail: format!("unreadable: {e}"),
                })?;
            if !has_pdf_signature(&magic) {
                return Err(ExtractError::InvalidDocument {
                    path,
                    detail: format!("missing %PDF signature (starts with {:?})", magic),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_signature() {
        assert!(has_pdf_signature(b"%PDF-1.7\n"));
        assert!(!has_pdf_signature(b"PK\x03\x04"));
        assert!(!has_pdf_signature(b"%PD"));
    }

    #[test]
    fn test_missing_file() {
        let err = validate_pdf_path(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn test_not_a_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello, not a pdf").unwrap();
        let err = validate_pdf_path(f.path()).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidDocument { .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_short_and_empty_files_rejected() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            validate_pdf_path(f.path()),
            Err(ExtractError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_pdf_path(dir.path()),
            Err(ExtractError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_pdf_header_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n").unwrap();
        assert_eq!(validate_pdf_path(f.path()).unwrap(), f.path());
    }
}
