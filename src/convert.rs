//! Eager conversion entry points.
//!
//! [`convert`] drives one document through the whole pipeline and returns
//! only once the final artifact exists (or the document has failed). Use
//! [`crate::stream::convert_directory_stream`] to receive per-document
//! outcomes of a directory as they complete.

use crate::config::ConversionConfig;
use crate::error::{Pdf2XlsxError, WindowError};
use crate::output::{ConversionOutput, ConversionStats, DocumentInfo, DocumentOutcome, WindowResult};
use crate::pipeline::batch::{PageBatcher, PageWindow};
use crate::pipeline::detect::PdfiumTableEngine;
use crate::pipeline::extract::{self, TableEngine};
use crate::pipeline::input;
use crate::pipeline::merge::{self, MergeCoordinator};
use crate::pipeline::write;
use crate::stream::convert_directory_stream;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert one PDF into `{stem}.xlsx` next to it.
///
/// # Errors
/// Every failure is fatal for the document:
/// - input errors (missing file, not a PDF, zero pages)
/// - with one window, the extraction or write error itself
/// - with several windows, [`Pdf2XlsxError::WindowsFailed`] if any window
///   failed, after deleting the intermediates already written when
///   `config.cleanup_on_failure` is set
/// - merge errors (unreadable intermediate, final write, cleanup)
pub async fn convert(
    pdf_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2XlsxError> {
    let total_start = Instant::now();
    let source = input::resolve_local(pdf_path)?;
    info!("Starting conversion: {}", source.display());

    let stem = input::document_stem(&source)?;
    let dir = artifact_dir(&source);
    let engine = resolve_engine(config);
    debug!("Extraction engine: {}", engine.name());

    // ── Plan windows ─────────────────────────────────────────────────────
    let page_count = extract::page_count(&engine, &source).await?;
    let batcher = PageBatcher::new(page_count, config.window_size)?;
    let total_windows = batcher.window_count();
    if total_windows == 0 {
        return Err(Pdf2XlsxError::EmptyDocument { path: source });
    }
    info!(
        "PDF has {} pages → {} windows of ≤ {} pages",
        page_count, total_windows, config.window_size
    );

    // Leftovers of an earlier run (interrupted, kept partial, other window
    // size) are never merged and never outlive a successful rerun.
    tokio::task::spawn_blocking({
        let dir = dir.clone();
        let stem = stem.clone();
        move || merge::purge_intermediates(&dir, &stem)
    })
    .await
    .map_err(|e| Pdf2XlsxError::Internal(format!("Purge task panicked: {}", e)))??;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_windows);
    }

    let job = WindowJob {
        engine,
        source: source.clone(),
        dir: dir.clone(),
        stem: stem.clone(),
        total_windows,
    };

    // ── Single window: no intermediates, no merge ────────────────────────
    if total_windows == 1 {
        let extract_start = Instant::now();
        let window = batcher.windows().next().ok_or_else(|| {
            Pdf2XlsxError::Internal("window plan changed between count and iteration".into())
        })?;
        let outcome = run_window(&job, window, config, Target::Final).await;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        let success = usize::from(outcome.failure.is_none());
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_complete(1, success);
        }
        if let Some(e) = outcome.failure {
            return Err(e);
        }

        let result = outcome.result;
        let stats = ConversionStats {
            total_pages: page_count,
            total_windows,
            total_rows: result.rows,
            total_columns: result.columns,
            extract_duration_ms,
            merge_duration_ms: 0,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        let final_artifact = result
            .artifact
            .clone()
            .unwrap_or_else(|| write::final_path(&dir, &stem));
        info!(
            "Conversion complete: {} ({} rows) in {}ms",
            final_artifact.display(),
            stats.total_rows,
            stats.total_duration_ms
        );
        return Ok(ConversionOutput {
            source,
            final_artifact,
            page_count,
            merged: false,
            windows: vec![WindowResult { artifact: None, ..result }],
            stats,
        });
    }

    // ── Fan out: extract → write per window ──────────────────────────────
    let extract_start = Instant::now();
    let mut outcomes: Vec<WindowOutcome> = stream::iter(batcher.windows())
        .map(|window| run_window(&job, window, config, Target::Intermediate))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    outcomes.sort_by_key(|o| o.result.index);

    let failed: Vec<&WindowOutcome> = outcomes.iter().filter(|o| o.failure.is_some()).collect();
    if !failed.is_empty() {
        let failed_count = failed.len();
        let first_error = failed
            .first()
            .and_then(|o| o.result.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());

        if config.cleanup_on_failure {
            let written: Vec<PathBuf> = outcomes.iter().filter_map(|o| o.result.artifact.clone()).collect();
            discard_artifacts(written).await;
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_complete(total_windows, total_windows - failed_count);
        }
        warn!(
            "{}/{} windows of {} failed; no final artifact written",
            failed_count,
            total_windows,
            source.display()
        );
        return Err(Pdf2XlsxError::WindowsFailed {
            failed: failed_count,
            total: total_windows,
            first_error,
        });
    }

    // ── Join barrier passed: merge ───────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_merge_start(total_windows);
    }
    let coordinator = MergeCoordinator::new(config.column_naming, config.sheet_name.clone());
    let merged = coordinator.merge_async(&dir, &stem).await;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_windows, total_windows);
    }
    let report = merged?;

    let windows: Vec<WindowResult> = outcomes
        .into_iter()
        .map(|o| WindowResult {
            artifact: None,
            ..o.result
        })
        .collect();

    let stats = ConversionStats {
        total_pages: page_count,
        total_windows,
        total_rows: report.rows,
        total_columns: report.columns,
        extract_duration_ms,
        merge_duration_ms: report.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} ({} rows from {} windows) in {}ms",
        report.final_path.display(),
        stats.total_rows,
        total_windows,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        source,
        final_artifact: report.final_path,
        page_count,
        merged: true,
        windows,
        stats,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    pdf_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2XlsxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2XlsxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(pdf_path, config))
}

/// Convert every PDF in `dir`, at most `config.document_concurrency` at once.
///
/// A failing document never aborts its siblings. Outcomes are sorted by
/// source path.
pub async fn convert_directory(
    dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Vec<DocumentOutcome>, Pdf2XlsxError> {
    let mut outcomes: Vec<DocumentOutcome> = convert_directory_stream(dir, config)?.collect().await;
    outcomes.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(outcomes)
}

/// Page count and window plan of a PDF, without extracting anything.
pub async fn inspect(
    pdf_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentInfo, Pdf2XlsxError> {
    let source = input::resolve_local(pdf_path)?;
    let stem = input::document_stem(&source)?;
    let engine = resolve_engine(config);
    let page_count = extract::page_count(&engine, &source).await?;
    let batcher = PageBatcher::new(page_count, config.window_size)?;
    Ok(DocumentInfo {
        source,
        stem,
        page_count,
        window_size: config.window_size,
        windows: batcher
            .windows()
            .map(|w| (w.first_page(), w.last_page()))
            .collect(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The caller's engine if one was configured, otherwise the pdfium detector.
pub(crate) fn resolve_engine(config: &ConversionConfig) -> Arc<dyn TableEngine> {
    match config.engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(PdfiumTableEngine::new(
            config.detector.clone(),
            config.password.clone(),
        )),
    }
}

/// Artifacts live next to their source document.
fn artifact_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

struct WindowJob {
    engine: Arc<dyn TableEngine>,
    source: PathBuf,
    dir: PathBuf,
    stem: String,
    total_windows: usize,
}

#[derive(Clone, Copy)]
enum Target {
    /// `{stem}_{n}.xlsx`, raw rows.
    Intermediate,
    /// `{stem}.xlsx`, normalized.
    Final,
}

struct WindowOutcome {
    result: WindowResult,
    failure: Option<Pdf2XlsxError>,
}

async fn run_window(
    job: &WindowJob,
    window: PageWindow,
    config: &ConversionConfig,
    target: Target,
) -> WindowOutcome {
    let start = Instant::now();
    let window_num = window.number();
    if let Some(ref cb) = config.progress_callback {
        cb.on_window_start(window_num, job.total_windows);
    }

    let mut result = WindowResult {
        index: window.index,
        first_page: window.first_page(),
        last_page: window.last_page(),
        rows: 0,
        columns: 0,
        artifact: None,
        duration_ms: 0,
        error: None,
    };

    let failure = match extract::extract_window(&job.engine, &job.source, window).await {
        Err(e) => {
            result.error = Some(WindowError::ExtractFailed {
                window: window_num,
                first_page: window.first_page(),
                last_page: window.last_page(),
                detail: e.to_string(),
            });
            Some(e)
        }
        Ok(table) => {
            let (table, path) = match target {
                Target::Intermediate => (table, write::intermediate_path(&job.dir, &job.stem, window.index)),
                Target::Final => (table.normalized(), write::final_path(&job.dir, &job.stem)),
            };
            result.rows = table.len();
            result.columns = table.width();
            match write::write_table_async(path, table, config.column_naming, config.sheet_name.clone()).await {
                Ok(path) => {
                    result.artifact = Some(path);
                    None
                }
                Err(e) => {
                    result.error = Some(WindowError::WriteFailed {
                        window: window_num,
                        detail: e.to_string(),
                    });
                    Some(e)
                }
            }
        }
    };
    result.duration_ms = start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_window_complete(window_num, job.total_windows, result.rows),
            Some(e) => cb.on_window_error(window_num, job.total_windows, &e.to_string()),
        }
    }
    if let Some(ref e) = result.error {
        warn!("{}", e);
    }

    WindowOutcome { result, failure }
}

/// Best-effort removal of intermediates of a failed document.
async fn discard_artifacts(paths: Vec<PathBuf>) {
    if paths.is_empty() {
        return;
    }
    let count = paths.len();
    let removal = tokio::task::spawn_blocking(move || {
        for path in &paths {
            if let Err(e) = merge::remove_artifact(path) {
                warn!("{}", e);
            }
        }
    })
    .await;
    match removal {
        Ok(()) => debug!("Removed {} partial intermediates", count),
        Err(e) => warn!("Cleanup task panicked: {}", e),
    }
}
