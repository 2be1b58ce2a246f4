//! Spreadsheet persistence: write a table to `.xlsx`, read one back.
//!
//! Every artifact has the same shape: one synthetic header row, data rows in
//! order, no index column, every cell a string, a single worksheet. Writes go
//! to a hidden `.tmp` sibling first and are renamed into place, so a crash
//! mid-write never leaves a truncated file under an artifact name that the
//! merge step would pick up.

use crate::error::Pdf2XlsxError;
use crate::table::{ColumnNaming, ExtractedTable};
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Columns an xlsx worksheet can hold.
const MAX_COLUMNS: usize = 16_384;

/// `{dir}/{stem}_{window_index + 1}.xlsx`
pub fn intermediate_path(dir: &Path, stem: &str, window_index: usize) -> PathBuf {
    dir.join(format!("{}_{}.xlsx", stem, window_index + 1))
}

/// `{dir}/{stem}.xlsx`
pub fn final_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.xlsx", stem))
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write `table` to `path` with a header row in `naming`. Blocking.
pub fn write_table(
    path: &Path,
    table: &ExtractedTable,
    naming: ColumnNaming,
    sheet_name: &str,
) -> Result<(), Pdf2XlsxError> {
    let write_err = |detail: String| Pdf2XlsxError::WriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    let width = table.width();
    if width > MAX_COLUMNS {
        return Err(write_err(format!(
            "{} columns exceed the xlsx limit of {}",
            width, MAX_COLUMNS
        )));
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name).map_err(|e| write_err(e.to_string()))?;

    for (col, header) in naming.headers(width).iter().enumerate() {
        sheet
            .write_string(0, col as u16, header)
            .map_err(|e| write_err(e.to_string()))?;
    }

    // Empty cells are written as blanks so that all-empty rows still count
    // toward the sheet's dimension and survive a read-back.
    let blank = Format::new();
    for (r, row) in table.rows().iter().enumerate() {
        let row_num = u32::try_from(r + 1).map_err(|_| write_err("too many rows".into()))?;
        for col in 0..width {
            let result = match row.get(col) {
                Some(cell) if !cell.is_empty() => sheet.write_string(row_num, col as u16, cell),
                _ => sheet.write_blank(row_num, col as u16, &blank),
            };
            result.map_err(|e| write_err(e.to_string()))?;
        }
    }

    let tmp = tmp_path(path);
    if let Err(e) = workbook.save(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(e.to_string()));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        write_err(format!("rename from {}: {}", tmp.display(), e))
    })?;

    debug!(
        "Wrote {} ({} rows × {} columns)",
        path.display(),
        table.len(),
        width
    );
    Ok(())
}

/// Contents of a written artifact: its header row and its data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub table: ExtractedTable,
}

/// Read the first worksheet of `path`. The first row is taken as the header
/// row. Blocking.
///
/// Rows run to the sheet's recorded dimension, not just to the last
/// non-empty cell, so trailing blank rows come back as rows of `""`.
pub fn read_sheet(path: &Path) -> Result<Sheet, Pdf2XlsxError> {
    let read_err = |detail: String| Pdf2XlsxError::ReadFailed {
        path: path.to_path_buf(),
        detail,
    };

    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| read_err(format!("{}", e)))?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Err(read_err("workbook has no worksheets".into()));
    };
    let extent = workbook
        .worksheet_cells_reader(&first)
        .map(|reader| reader.dimensions())
        .map_err(|e| read_err(format!("{}", e)))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| read_err(format!("{}", e)))?;

    let (Some((first_row, first_col)), Some((last_row, last_col))) = (range.start(), range.end())
    else {
        return Ok(Sheet {
            headers: Vec::new(),
            table: ExtractedTable::empty(),
        });
    };
    let last_row = last_row.max(extent.end.0);
    let last_col = last_col.max(extent.end.1);

    let mut rows = (first_row..=last_row).map(|r| {
        (first_col..=last_col)
            .map(|c| range.get_value((r, c)).map(cell_as_string).unwrap_or_default())
            .collect::<Vec<String>>()
    });
    let headers = rows.next().unwrap_or_default();
    let table = ExtractedTable::new(rows.collect());
    Ok(Sheet { headers, table })
}

/// Data rows of `path` without its header row. Blocking.
pub fn read_table(path: &Path) -> Result<ExtractedTable, Pdf2XlsxError> {
    read_sheet(path).map(|s| s.table)
}

fn cell_as_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Persist one window's table as its intermediate artifact.
pub async fn write_intermediate(
    dir: &Path,
    stem: &str,
    window_index: usize,
    table: ExtractedTable,
    naming: ColumnNaming,
    sheet_name: &str,
) -> Result<PathBuf, Pdf2XlsxError> {
    let path = intermediate_path(dir, stem, window_index);
    write_table_async(path, table, naming, sheet_name.to_string()).await
}

/// [`write_table`] on a blocking thread; returns the written path.
pub async fn write_table_async(
    path: PathBuf,
    table: ExtractedTable,
    naming: ColumnNaming,
    sheet_name: String,
) -> Result<PathBuf, Pdf2XlsxError> {
    tokio::task::spawn_blocking(move || {
        write_table(&path, &table, naming, &sheet_name)?;
        Ok(path)
    })
    .await
    .map_err(|e| Pdf2XlsxError::Internal(format!("Write task panicked: {}", e)))?
}
