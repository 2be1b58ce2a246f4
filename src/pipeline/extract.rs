//! Table extraction: run the engine over one window's page range.
//!
//! The engine itself is opaque — anything implementing [`TableEngine`] can
//! plug in (the built-in [`crate::pipeline::detect::PdfiumTableEngine`], a
//! scripted engine in tests, a bridge to an external service). Engines are
//! blocking, so every call is moved onto tokio's blocking pool the same way
//! the rasterisation stage of a pdfium pipeline is.

use crate::error::Pdf2XlsxError;
use crate::pipeline::batch::{PageRange, PageWindow};
use crate::table::ExtractedTable;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A capability that locates tables in a PDF.
///
/// Implementations must be `Send + Sync`: windows of the same document are
/// extracted concurrently from several blocking threads.
pub trait TableEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }

    /// Number of pages in the document.
    fn page_count(&self, pdf_path: &Path) -> Result<usize, Pdf2XlsxError>;

    /// Every table detected within `pages`, in page order.
    ///
    /// Zero detected tables is `Ok(vec![])`, not an error.
    fn extract_tables(
        &self,
        pdf_path: &Path,
        pages: &PageRange,
    ) -> Result<Vec<ExtractedTable>, Pdf2XlsxError>;
}

/// Ask the engine for the document's page count on a blocking thread.
pub async fn page_count(engine: &Arc<dyn TableEngine>, pdf_path: &Path) -> Result<usize, Pdf2XlsxError> {
    let engine = Arc::clone(engine);
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || engine.page_count(&path))
        .await
        .map_err(|e| Pdf2XlsxError::Internal(format!("Page-count task panicked: {}", e)))?
}

/// Extract one window as a single table: all detected tables, concatenated
/// in page order.
pub async fn extract_window(
    engine: &Arc<dyn TableEngine>,
    pdf_path: &Path,
    window: PageWindow,
) -> Result<ExtractedTable, Pdf2XlsxError> {
    let engine = Arc::clone(engine);
    let path: PathBuf = pdf_path.to_path_buf();
    let pages = window.page_range();

    let start = Instant::now();
    let tables = tokio::task::spawn_blocking(move || engine.extract_tables(&path, &pages))
        .await
        .map_err(|e| Pdf2XlsxError::Internal(format!("Extraction task panicked: {}", e)))??;

    let table_count = tables.len();
    let table = ExtractedTable::concat(tables);
    debug!(
        "Window {} (pages {}-{}): {} tables, {} rows in {}ms",
        window.number(),
        window.first_page(),
        window.last_page(),
        table_count,
        table.len(),
        start.elapsed().as_millis()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Two tables per page; records every range it was asked for.
    struct TwoTablesPerPage {
        seen: Mutex<Vec<String>>,
    }

    impl TableEngine for TwoTablesPerPage {
        fn page_count(&self, _pdf_path: &Path) -> Result<usize, Pdf2XlsxError> {
            Ok(7)
        }

        fn extract_tables(
            &self,
            _pdf_path: &Path,
            pages: &PageRange,
        ) -> Result<Vec<ExtractedTable>, Pdf2XlsxError> {
            self.seen.lock().unwrap().push(pages.to_string());
            Ok(pages
                .pages()
                .iter()
                .flat_map(|p| {
                    [
                        ExtractedTable::new(vec![vec![format!("{p}a")]]),
                        ExtractedTable::new(vec![vec![format!("{p}b"), "x".into()]]),
                    ]
                })
                .collect())
        }
    }

    struct NoTables;

    impl TableEngine for NoTables {
        fn page_count(&self, _pdf_path: &Path) -> Result<usize, Pdf2XlsxError> {
            Ok(1)
        }

        fn extract_tables(
            &self,
            _pdf_path: &Path,
            _pages: &PageRange,
        ) -> Result<Vec<ExtractedTable>, Pdf2XlsxError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn concatenates_tables_in_page_order() {
        let engine = Arc::new(TwoTablesPerPage {
            seen: Mutex::new(Vec::new()),
        });
        let dyn_engine: Arc<dyn TableEngine> = engine.clone();
        let window = PageWindow {
            index: 1,
            start: 2,
            end: 4,
        };

        let table = extract_window(&dyn_engine, Path::new("doc.pdf"), window)
            .await
            .unwrap();

        let firsts: Vec<&str> = table.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(firsts, vec!["3a", "3b", "4a", "4b"]);
        assert_eq!(table.width(), 2);
        assert_eq!(engine.seen.lock().unwrap().as_slice(), &["3,4".to_string()]);
        assert_eq!(page_count(&dyn_engine, Path::new("doc.pdf")).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn no_tables_is_an_empty_table() {
        let engine: Arc<dyn TableEngine> = Arc::new(NoTables);
        let window = PageWindow {
            index: 0,
            start: 0,
            end: 1,
        };
        let table = extract_window(&engine, Path::new("doc.pdf"), window).await.unwrap();
        assert!(table.is_empty());
    }
}
