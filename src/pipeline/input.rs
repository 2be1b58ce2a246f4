//! Input resolution: validate source PDFs and discover them in directories.
//!
//! The magic bytes (`%PDF`) are checked before any engine sees the file, so
//! a mistyped path or a renamed spreadsheet yields a precise error instead of
//! a pdfium failure deep inside a blocking task.

use crate::error::Pdf2XlsxError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<PathBuf, Pdf2XlsxError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(Pdf2XlsxError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            let read = f.read(&mut magic).unwrap_or(0);
            if read < 4 || &magic != b"%PDF" {
                return Err(Pdf2XlsxError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2XlsxError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2XlsxError::FileNotFound { path }),
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// File-name stem used for every artifact derived from `path`.
pub fn document_stem(path: &Path) -> Result<String, Pdf2XlsxError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Pdf2XlsxError::InvalidConfig(format!("No usable file stem in {}", path.display())))
}

/// Every `*.pdf` directly inside `dir` (extension matched case-insensitively),
/// sorted by file name. Subdirectories are not descended into.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, Pdf2XlsxError> {
    discover_by_extension(dir, "pdf")
}

/// Every file directly inside `dir` whose extension equals `ext`
/// case-insensitively, sorted by file name.
pub(crate) fn discover_by_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, Pdf2XlsxError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Pdf2XlsxError::FileNotFound {
            path: dir.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Pdf2XlsxError::PermissionDenied {
            path: dir.to_path_buf(),
        },
        _ => Pdf2XlsxError::Internal(format!("Cannot list {}: {}", dir.display(), e)),
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect();
    found.sort();
    debug!("Found {} .{} files in {}", found.len(), ext, dir.display());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected_with_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"PK\x03\x04rest").unwrap();
        match resolve_local(&path).unwrap_err() {
            Pdf2XlsxError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_file_is_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert!(matches!(resolve_local(&path), Err(Pdf2XlsxError::NotAPdf { .. })));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_local(&path).unwrap(), path);
    }

    #[test]
    fn stem_of_report() {
        assert_eq!(document_stem(Path::new("/a/b/report.v2.pdf")).unwrap(), "report.v2");
    }

    #[test]
    fn discovers_pdfs_case_insensitively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PDF", "a.pdf", "notes.txt", "c.xlsx"] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let found = discover_documents(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
    }
}
