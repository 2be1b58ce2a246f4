//! # edgequake-pdf2xlsx
//!
//! Extract the tables of long PDF reports into a single Excel spreadsheet.
//!
//! ## Why windows?
//!
//! Table detection over a whole 1000-page report in one call holds every
//! page's layout in memory at once and reports nothing until the very end.
//! This crate splits the document into fixed-size page windows (100 pages by
//! default), extracts each window concurrently into its own intermediate
//! `.xlsx`, and merges the intermediates, in window order, into one
//! normalized `{stem}.xlsx` next to the source.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path and %PDF magic
//!  ├─ 2. Batch    page count → windows of ≤ W pages
//!  ├─ 3. Extract  table engine per window (spawn_blocking, N in flight)
//!  ├─ 4. Write    {stem}_{n}.xlsx per window (atomic tmp + rename)
//!  └─ 5. Merge    numeric order → pad → column_N headers → {stem}.xlsx
//! ```
//!
//! A document with a single window skips 4-5 and writes `{stem}.xlsx`
//! directly.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2xlsx::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("report.pdf", &config).await?;
//!     println!("{} → {} rows", output.final_artifact.display(), output.stats.total_rows);
//!     Ok(())
//! }
//! ```
//!
//! ## Collaborators
//!
//! - [`database`]: load a spreadsheet into SQLite with typed columns
//! - [`ocr`]: text from scanned (image-only) PDFs
//! - [`mail`]: send a report over SMTPS with `.env` credentials
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `mail`  | on      | SMTP delivery via lettre |
//! | `ocr`   | off     | Tesseract recognition via leptess (needs system libtesseract) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod database;
pub mod error;
pub mod mail;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_SHEET_NAME, DEFAULT_WINDOW_SIZE};
pub use convert::{convert, convert_directory, convert_sync, inspect};
pub use database::{add_text_column, xlsx_dir_to_sqlite, xlsx_to_sqlite, CoercionPlan, SqliteReport};
pub use error::{ErrorCategory, Pdf2XlsxError, WindowError};
pub use mail::{send_email, Email, MailConfig};
pub use ocr::{ocr_document, OcrConfig, OcrOutput};
pub use output::{ConversionOutput, ConversionStats, DocumentInfo, DocumentOutcome, WindowResult};
pub use pipeline::batch::{PageBatcher, PageRange, PageWindow};
pub use pipeline::detect::{PdfiumTableEngine, TableDetectorConfig};
pub use pipeline::extract::TableEngine;
pub use pipeline::merge::{MergeCoordinator, MergeReport};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_directory_stream, DocumentStream};
pub use table::{ColumnNaming, ExtractedTable};
