//! Merge step: fold a document's intermediate artifacts into its final one.
//!
//! Intermediates are ordered by the window number parsed from their name,
//! never lexicographically: `report_10.xlsx` comes after `report_2.xlsx`.
//! Intermediates are deleted only once the final artifact has been written
//! in full, so a failed merge can always be retried from the same files.

use crate::config::DEFAULT_SHEET_NAME;
use crate::error::Pdf2XlsxError;
use crate::pipeline::write::{final_path, read_table, write_table};
use crate::table::{ColumnNaming, ExtractedTable};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// An intermediate found on disk, with the window number parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Intermediate {
    pub window_num: u64,
    pub path: PathBuf,
}

fn intermediate_pattern(stem: &str) -> Result<Regex, Pdf2XlsxError> {
    Regex::new(&format!(r"^{}_(\d+)\.xlsx$", regex::escape(stem)))
        .map_err(|e| Pdf2XlsxError::Internal(format!("Bad intermediate pattern: {}", e)))
}

/// Intermediates of `stem` in `dir`, ascending by window number.
pub fn discover_intermediates(dir: &Path, stem: &str) -> Result<Vec<Intermediate>, Pdf2XlsxError> {
    let pattern = intermediate_pattern(stem)?;
    let entries = std::fs::read_dir(dir).map_err(|e| Pdf2XlsxError::ReadFailed {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut found: Vec<Intermediate> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let window_num = pattern.captures(name)?.get(1)?.as_str().parse().ok()?;
            Some(Intermediate {
                window_num,
                path: entry.path(),
            })
        })
        .filter(|i| i.path.is_file())
        .collect();
    found.sort();
    Ok(found)
}

/// Delete every intermediate of `stem` in `dir`. Returns how many were removed.
pub fn purge_intermediates(dir: &Path, stem: &str) -> Result<usize, Pdf2XlsxError> {
    let stale = discover_intermediates(dir, stem)?;
    for item in &stale {
        remove_artifact(&item.path)?;
    }
    if !stale.is_empty() {
        info!("Removed {} stale intermediates of '{}'", stale.len(), stem);
    }
    Ok(stale.len())
}

/// Delete one artifact; already-missing files are fine.
pub(crate) fn remove_artifact(path: &Path) -> Result<(), Pdf2XlsxError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Pdf2XlsxError::CleanupFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// What a merge produced.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub final_path: PathBuf,
    /// Intermediates consumed (and deleted), in merge order.
    pub artifacts: Vec<PathBuf>,
    pub rows: usize,
    pub columns: usize,
    pub duration_ms: u64,
}

/// Discovers, orders, concatenates and normalizes intermediates.
#[derive(Debug, Clone)]
pub struct MergeCoordinator {
    naming: ColumnNaming,
    sheet_name: String,
}

impl Default for MergeCoordinator {
    fn default() -> Self {
        Self::new(ColumnNaming::default(), DEFAULT_SHEET_NAME)
    }
}

impl MergeCoordinator {
    pub fn new(naming: ColumnNaming, sheet_name: impl Into<String>) -> Self {
        Self {
            naming,
            sheet_name: sheet_name.into(),
        }
    }

    /// Merge every intermediate of `stem` in `dir` into `{stem}.xlsx`. Blocking.
    ///
    /// With no intermediates this fails with `NothingToMerge` and leaves any
    /// existing final artifact untouched.
    pub fn merge(&self, dir: &Path, stem: &str) -> Result<MergeReport, Pdf2XlsxError> {
        let start = Instant::now();
        let intermediates = discover_intermediates(dir, stem)?;
        if intermediates.is_empty() {
            return Err(Pdf2XlsxError::NothingToMerge {
                stem: stem.to_string(),
                dir: dir.to_path_buf(),
            });
        }

        let mut tables = Vec::with_capacity(intermediates.len());
        for item in &intermediates {
            let table = read_table(&item.path)?;
            debug!("Merging {} ({} rows)", item.path.display(), table.len());
            tables.push(table);
        }

        let merged = ExtractedTable::concat(tables).normalized();
        let target = final_path(dir, stem);
        write_table(&target, &merged, self.naming, &self.sheet_name)?;

        let artifacts: Vec<PathBuf> = intermediates.into_iter().map(|i| i.path).collect();
        for path in &artifacts {
            if let Err(e) = remove_artifact(path) {
                warn!("Final artifact written but {} could not be removed", path.display());
                return Err(e);
            }
        }

        let report = MergeReport {
            final_path: target,
            artifacts,
            rows: merged.len(),
            columns: merged.width(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Merged {} intermediates into {} ({} rows × {} columns)",
            report.artifacts.len(),
            report.final_path.display(),
            report.rows,
            report.columns
        );
        Ok(report)
    }

    /// [`MergeCoordinator::merge`] on a blocking thread.
    pub async fn merge_async(&self, dir: &Path, stem: &str) -> Result<MergeReport, Pdf2XlsxError> {
        let this = self.clone();
        let dir = dir.to_path_buf();
        let stem = stem.to_string();
        tokio::task::spawn_blocking(move || this.merge(&dir, &stem))
            .await
            .map_err(|e| Pdf2XlsxError::Internal(format!("Merge task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::write::{intermediate_path, read_sheet};

    fn one_cell(text: &str) -> ExtractedTable {
        ExtractedTable::new(vec![vec![text.to_string()]])
    }

    fn write(dir: &Path, stem: &str, index: usize, table: &ExtractedTable) {
        write_table(&intermediate_path(dir, stem, index), table, ColumnNaming::Generic, "Sheet1").unwrap();
    }

    #[test]
    fn discovery_orders_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for n in [10usize, 2, 1] {
            std::fs::write(dir.path().join(format!("doc_{n}.xlsx")), b"").unwrap();
        }
        std::fs::write(dir.path().join("doc_x.xlsx"), b"").unwrap();
        std::fs::write(dir.path().join("doc.xlsx"), b"").unwrap();
        std::fs::write(dir.path().join("other_3.xlsx"), b"").unwrap();
        std::fs::write(dir.path().join(".doc_4.xlsx.tmp"), b"").unwrap();

        let nums: Vec<u64> = discover_intermediates(dir.path(), "doc")
            .unwrap()
            .iter()
            .map(|i| i.window_num)
            .collect();
        assert_eq!(nums, vec![1, 2, 10]);
    }

    #[test]
    fn stem_with_regex_metacharacters_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.b(1)_1.xlsx"), b"").unwrap();
        std::fs::write(dir.path().join("aXb(1)_2.xlsx"), b"").unwrap();
        let found = discover_intermediates(dir.path(), "a.b(1)").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn merge_concatenates_in_window_order_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..11 {
            write(dir.path(), "doc", i, &one_cell(&format!("w{}", i + 1)));
        }

        let report = MergeCoordinator::default().merge(dir.path(), "doc").unwrap();
        assert_eq!(report.rows, 11);
        assert_eq!(report.artifacts.len(), 11);

        let sheet = read_sheet(&report.final_path).unwrap();
        let firsts: Vec<&str> = sheet.table.rows().iter().map(|r| r[0].as_str()).collect();
        let expected: Vec<String> = (1..=11).map(|n| format!("w{n}")).collect();
        assert_eq!(firsts, expected);
        assert!(discover_intermediates(dir.path(), "doc").unwrap().is_empty());
    }

    #[test]
    fn merge_pads_and_sanitizes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "doc", 0, &one_cell("line\none"));
        write(
            dir.path(),
            "doc",
            1,
            &ExtractedTable::new(vec![vec!["a".into(), "b".into(), "c\r\nd".into()]]),
        );

        let report = MergeCoordinator::default().merge(dir.path(), "doc").unwrap();
        let sheet = read_sheet(&report.final_path).unwrap();
        assert_eq!(sheet.headers, vec!["column_0", "column_1", "column_2"]);
        assert_eq!(sheet.table.rows()[0], vec!["line one", "", ""]);
        assert_eq!(sheet.table.rows()[1], vec!["a", "b", "c d"]);
    }

    #[test]
    fn nothing_to_merge_keeps_existing_final() {
        let dir = tempfile::tempdir().unwrap();
        let existing = final_path(dir.path(), "doc");
        std::fs::write(&existing, b"previous").unwrap();

        let err = MergeCoordinator::default().merge(dir.path(), "doc").unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::NothingToMerge { .. }));
        assert_eq!(std::fs::read(&existing).unwrap(), b"previous");
    }

    #[test]
    fn unreadable_intermediate_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "doc", 0, &one_cell("ok"));
        std::fs::write(intermediate_path(dir.path(), "doc", 1), b"garbage").unwrap();

        let err = MergeCoordinator::default().merge(dir.path(), "doc").unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::ReadFailed { .. }));
        assert!(!final_path(dir.path(), "doc").exists());
        assert_eq!(discover_intermediates(dir.path(), "doc").unwrap().len(), 2);
    }

    #[test]
    fn purge_removes_only_matching() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "doc", 0, &one_cell("a"));
        write(dir.path(), "doc", 4, &one_cell("b"));
        write(dir.path(), "other", 0, &one_cell("c"));
        assert_eq!(purge_intermediates(dir.path(), "doc").unwrap(), 2);
        assert!(intermediate_path(dir.path(), "other", 0).exists());
    }

    #[test]
    fn merge_async_reports_rows_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "doc", 0, &ExtractedTable::new(vec![vec!["a".into(), "b".into()]]));
        write(dir.path(), "doc", 1, &one_cell("c"));

        let report = tokio_test::block_on(MergeCoordinator::default().merge_async(dir.path(), "doc")).unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.rows, 2);
        assert_eq!(report.columns, 2);
    }
}
