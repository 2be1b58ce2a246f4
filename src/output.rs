//! Result types returned by the conversion entry points.

use crate::error::{Pdf2XlsxError, WindowError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of converting one source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The source PDF.
    pub source: PathBuf,
    /// `{stem}.xlsx` next to the source.
    pub final_artifact: PathBuf,
    /// Pages in the source document.
    pub page_count: usize,
    /// Whether the merge step ran (more than one window).
    pub merged: bool,
    /// Per-window results, ordered by window index.
    pub windows: Vec<WindowResult>,
    pub stats: ConversionStats,
}

/// What happened to one page window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    /// 0-indexed window position.
    pub index: usize,
    /// First page of the window (1-indexed, inclusive).
    pub first_page: usize,
    /// Last page of the window (1-indexed, inclusive).
    pub last_page: usize,
    /// Rows extracted from the window.
    pub rows: usize,
    /// Width of the widest extracted row.
    pub columns: usize,
    /// Intermediate artifact written for this window, if any. `None` once it
    /// has been merged and deleted, and for a single-window document.
    pub artifact: Option<PathBuf>,
    pub duration_ms: u64,
    pub error: Option<WindowError>,
}

impl WindowResult {
    /// 1-indexed window number, as used in artifact names.
    pub fn window_num(&self) -> usize {
        self.index + 1
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_windows: usize,
    /// Rows in the final artifact.
    pub total_rows: usize,
    /// Columns in the final artifact.
    pub total_columns: usize,
    pub extract_duration_ms: u64,
    pub merge_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Page count and window plan of a document, without extracting anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub source: PathBuf,
    pub stem: String,
    pub page_count: usize,
    pub window_size: usize,
    /// `(first_page, last_page)` per window, 1-indexed and inclusive.
    pub windows: Vec<(usize, usize)>,
}

/// Outcome of one document in a directory conversion.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub source: PathBuf,
    pub result: Result<ConversionOutput, Pdf2XlsxError>,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
