//! Error types for the edgequake-pdf2xlsx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2XlsxError`] — **Fatal**: the operation cannot complete (bad input
//!   file, unreadable PDF, artifact write failure, nothing to merge, missing
//!   SMTP credentials). Returned as `Err(Pdf2XlsxError)` from every public
//!   entry point.
//!
//! * [`WindowError`] — **Per-window**: one page window failed to extract or
//!   persist. Stored in [`crate::output::WindowResult`] and reported to the
//!   progress callback, then aggregated into
//!   [`Pdf2XlsxError::WindowsFailed`] so the document is never reported as
//!   complete with a hole in it.
//!
//! Every variant maps onto one [`ErrorCategory`], the taxonomy callers (the
//! CLI, a GUI, a job runner) use for user-facing reporting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2xlsx library.
#[derive(Debug, Error)]
pub enum Pdf2XlsxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The document has no pages, so there is nothing to extract.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none (or a wrong one) was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A page of the requested range does not exist in the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The extraction engine failed on a page range.
    #[error("Table extraction failed for '{path}' pages [{pages}]: {detail}")]
    Extraction {
        path: PathBuf,
        pages: String,
        detail: String,
    },

    /// At least one window failed; the document conversion is abandoned.
    #[error("{failed}/{total} page windows failed.\nFirst error: {first_error}")]
    WindowsFailed {
        failed: usize,
        total: usize,
        first_error: String,
    },

    // ── Write errors ──────────────────────────────────────────────────────
    /// Could not create or write a spreadsheet artifact.
    #[error("Failed to write '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },

    // ── Merge errors ──────────────────────────────────────────────────────
    /// No intermediate artifact matched the document stem.
    #[error("Nothing to merge: no '{stem}_<n>.xlsx' artifacts in '{dir}'")]
    NothingToMerge { stem: String, dir: PathBuf },

    /// An intermediate artifact exists but could not be read back.
    #[error("Failed to read artifact '{path}': {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    /// The final artifact was written but an intermediate could not be removed.
    #[error("Failed to remove intermediate '{path}': {source}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or argument validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required credential variable is missing from the environment / `.env`.
    #[error("Missing configuration value '{var}'\nSet it in the environment or in the .env file.")]
    MissingCredential { var: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH=/path/to/libpdfium\n\
to point at an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Collaborator errors ───────────────────────────────────────────────
    /// SQLite export failed.
    #[error("Database error for '{path}': {detail}")]
    Database { path: PathBuf, detail: String },

    /// A cell could not be coerced to the planned column type.
    #[error("Row {row}, column {column}: cannot convert {value:?} to {target}")]
    Coercion {
        row: usize,
        column: usize,
        value: String,
        target: &'static str,
    },

    /// OCR produced no usable output or failed.
    #[error("OCR failed for '{path}': {detail}")]
    Ocr { path: PathBuf, detail: String },

    /// The binary was built without the `ocr` feature.
    #[error("OCR support is not compiled in.\nRebuild with: cargo install edgequake-pdf2xlsx --features ocr")]
    OcrUnavailable,

    /// Composing or sending an email failed.
    #[error("Mail delivery failed: {0}")]
    Mail(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error taxonomy used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Input,
    Extraction,
    Write,
    Merge,
    Configuration,
    Database,
    Ocr,
    Mail,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Input => "input error",
            ErrorCategory::Extraction => "extraction error",
            ErrorCategory::Write => "write error",
            ErrorCategory::Merge => "merge error",
            ErrorCategory::Configuration => "configuration error",
            ErrorCategory::Database => "database error",
            ErrorCategory::Ocr => "OCR error",
            ErrorCategory::Mail => "mail error",
            ErrorCategory::Internal => "internal error",
        };
        f.write_str(s)
    }
}

impl Pdf2XlsxError {
    /// Map this error onto the reporting taxonomy.
    pub fn category(&self) -> ErrorCategory {
        use Pdf2XlsxError::*;
        match self {
            FileNotFound { .. } | PermissionDenied { .. } | NotAPdf { .. } | EmptyDocument { .. } => {
                ErrorCategory::Input
            }
            CorruptPdf { .. }
            | PasswordRequired { .. }
            | PageOutOfRange { .. }
            | Extraction { .. }
            | WindowsFailed { .. } => ErrorCategory::Extraction,
            WriteFailed { .. } => ErrorCategory::Write,
            NothingToMerge { .. } | ReadFailed { .. } | CleanupFailed { .. } => ErrorCategory::Merge,
            InvalidConfig(_) | MissingCredential { .. } | PdfiumBindingFailed(_) => {
                ErrorCategory::Configuration
            }
            Database { .. } | Coercion { .. } => ErrorCategory::Database,
            Ocr { .. } | OcrUnavailable => ErrorCategory::Ocr,
            Mail(_) => ErrorCategory::Mail,
            Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// A failure confined to a single page window.
///
/// `window` is 1-indexed, matching the `{stem}_{window}.xlsx` artifact name.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum WindowError {
    /// The extraction engine failed on this window's page range.
    #[error("Window {window} (pages {first_page}-{last_page}): extraction failed: {detail}")]
    ExtractFailed {
        window: usize,
        first_page: usize,
        last_page: usize,
        detail: String,
    },

    /// The intermediate artifact could not be written.
    #[error("Window {window}: writing intermediate failed: {detail}")]
    WriteFailed { window: usize, detail: String },
}

impl WindowError {
    /// 1-indexed window number this error belongs to.
    pub fn window(&self) -> usize {
        match self {
            WindowError::ExtractFailed { window, .. } | WindowError::WriteFailed { window, .. } => {
                *window
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_failed_display() {
        let e = Pdf2XlsxError::WindowsFailed {
            failed: 1,
            total: 3,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("1/3"), "got: {msg}");
        assert!(msg.contains("boom"));
        assert_eq!(e.category(), ErrorCategory::Extraction);
    }

    #[test]
    fn nothing_to_merge_is_merge_error() {
        let e = Pdf2XlsxError::NothingToMerge {
            stem: "report".into(),
            dir: PathBuf::from("/tmp"),
        };
        assert!(e.to_string().contains("report_<n>.xlsx"));
        assert_eq!(e.category(), ErrorCategory::Merge);
    }

    #[test]
    fn credential_and_window_size_are_configuration_errors() {
        let e = Pdf2XlsxError::MissingCredential {
            var: "SMTP_SERVER".into(),
        };
        assert!(e.to_string().contains("SMTP_SERVER"));
        assert_eq!(e.category(), ErrorCategory::Configuration);
        assert_eq!(
            Pdf2XlsxError::InvalidConfig("window size".into()).category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn write_failed_display() {
        let e = Pdf2XlsxError::WriteFailed {
            path: PathBuf::from("out/report_2.xlsx"),
            detail: "disk full".into(),
        };
        assert!(e.to_string().contains("report_2.xlsx"));
        assert_eq!(e.category(), ErrorCategory::Write);
        assert_eq!(e.category().to_string(), "write error");
    }

    #[test]
    fn window_error_reports_its_window() {
        let e = WindowError::ExtractFailed {
            window: 2,
            first_page: 101,
            last_page: 200,
            detail: "bad xref".into(),
        };
        assert_eq!(e.window(), 2);
        assert!(e.to_string().contains("pages 101-200"));
    }
}
