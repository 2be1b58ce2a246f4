//! Pipeline stages for PDF-to-spreadsheet conversion.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ batch ──▶ extract ──▶ write ──▶ merge
//! (path)    (windows)  (engine)   (xlsx)    (final xlsx)
//! ```
//!
//! 1. [`input`]   — validate the source PDF; discover PDFs in a directory
//! 2. [`batch`]   — split the page count into fixed-size windows
//! 3. [`extract`] — run a [`extract::TableEngine`] over one window on a
//!    blocking thread; [`detect`] holds the built-in pdfium engine
//! 4. [`write`]   — persist a window's table as `{stem}_{n}.xlsx`
//! 5. [`merge`]   — fold the intermediates, in window order, into `{stem}.xlsx`

pub mod batch;
pub mod detect;
pub mod extract;
pub mod input;
pub mod merge;
pub mod write;
