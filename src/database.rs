//! SQLite export of converted spreadsheets.
//!
//! Each `{stem}.xlsx` becomes `{stem}.db` holding a single table `xlsx`. The
//! spreadsheet's header row is discarded and columns are named `column_N`.
//! Every cell arrives as text; a [`CoercionPlan`] picks the columns that are
//! stored as integers or ISO dates instead.

use crate::error::Pdf2XlsxError;
use crate::pipeline::input::discover_by_extension;
use crate::pipeline::write::read_table;
use crate::table::ColumnNaming;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the table every export writes.
pub const TABLE_NAME: &str = "xlsx";

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Text,
    Integer,
    /// Parsed with the plan's date format, stored as `YYYY-MM-DD`.
    Date,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Date => "DATE",
        }
    }
}

/// Which columns to coerce, and how to read dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionPlan {
    /// 0-indexed columns stored as INTEGER.
    pub integer_columns: Vec<usize>,
    /// 0-indexed columns stored as ISO dates.
    pub date_columns: Vec<usize>,
    /// `chrono` format of the date cells. Default `%d.%m.%y`.
    pub date_format: String,
}

impl Default for CoercionPlan {
    fn default() -> Self {
        Self {
            integer_columns: vec![0],
            date_columns: vec![1, 4],
            date_format: "%d.%m.%y".to_string(),
        }
    }
}

impl CoercionPlan {
    /// A plan that stores everything as text.
    pub fn text_only() -> Self {
        Self {
            integer_columns: Vec::new(),
            date_columns: Vec::new(),
            ..Self::default()
        }
    }

    /// Storage type of column `col`. A column in both lists is a date.
    pub fn kind(&self, col: usize) -> ColumnKind {
        if self.date_columns.contains(&col) {
            ColumnKind::Date
        } else if self.integer_columns.contains(&col) {
            ColumnKind::Integer
        } else {
            ColumnKind::Text
        }
    }

    fn check_width(&self, width: usize, path: &Path) -> Result<(), Pdf2XlsxError> {
        let planned = self.integer_columns.iter().chain(&self.date_columns);
        if let Some(col) = planned.filter(|&&c| c >= width).max() {
            return Err(Pdf2XlsxError::Database {
                path: path.to_path_buf(),
                detail: format!(
                    "coercion planned for column {} but the sheet has {} columns",
                    col, width
                ),
            });
        }
        Ok(())
    }

    /// Convert one cell. `row` and `col` only feed the error message.
    pub fn coerce(&self, row: usize, col: usize, cell: &str) -> Result<Value, Pdf2XlsxError> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        match self.kind(col) {
            ColumnKind::Text => Ok(Value::Text(cell.to_string())),
            ColumnKind::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| Pdf2XlsxError::Coercion {
                    row,
                    column: col,
                    value: cell.to_string(),
                    target: "integer",
                }),
            ColumnKind::Date => NaiveDate::parse_from_str(trimmed, &self.date_format)
                .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| Pdf2XlsxError::Coercion {
                    row,
                    column: col,
                    value: cell.to_string(),
                    target: "date",
                }),
        }
    }
}

/// What one export wrote.
#[derive(Debug, Clone, Serialize)]
pub struct SqliteReport {
    pub source: PathBuf,
    pub db_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// `{dir}/{stem}.db` for a spreadsheet path.
pub fn database_path(xlsx_path: &Path) -> PathBuf {
    xlsx_path.with_extension("db")
}

/// Replace table `xlsx` in `{stem}.db` with the contents of `xlsx_path`. Blocking.
///
/// Rows in coercion errors are 1-indexed data rows (the header row is not
/// counted). A failed coercion leaves the database unchanged.
pub fn xlsx_to_sqlite(xlsx_path: &Path, plan: &CoercionPlan) -> Result<SqliteReport, Pdf2XlsxError> {
    let table = read_table(xlsx_path)?.normalized();
    let width = table.width();
    plan.check_width(width, xlsx_path)?;

    let db_path = database_path(xlsx_path);
    let db_err = |e: rusqlite::Error| Pdf2XlsxError::Database {
        path: db_path.clone(),
        detail: e.to_string(),
    };

    // Coerce everything up front so a bad cell never reaches the database.
    let mut values: Vec<Vec<Value>> = Vec::with_capacity(table.len());
    for (r, row) in table.rows().iter().enumerate() {
        let coerced = row
            .iter()
            .enumerate()
            .map(|(c, cell)| plan.coerce(r + 1, c, cell))
            .collect::<Result<Vec<_>, _>>()?;
        values.push(coerced);
    }

    let naming = ColumnNaming::Generic;
    let columns: Vec<String> = (0..width)
        .map(|c| format!("\"{}\" {}", naming.header(c), plan.kind(c).sql_type()))
        .collect();

    let mut conn = Connection::open(&db_path).map_err(db_err)?;
    let tx = conn.transaction().map_err(db_err)?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE_NAME};"))
        .map_err(db_err)?;
    if width > 0 {
        tx.execute_batch(&format!("CREATE TABLE {TABLE_NAME} ({});", columns.join(", ")))
            .map_err(db_err)?;
        let placeholders = vec!["?"; width].join(", ");
        let mut stmt = tx
            .prepare(&format!("INSERT INTO {TABLE_NAME} VALUES ({placeholders})"))
            .map_err(db_err)?;
        for row in values {
            stmt.execute(params_from_iter(row)).map_err(db_err)?;
        }
    }
    tx.commit().map_err(db_err)?;

    info!(
        "Exported {} → {} ({} rows × {} columns)",
        xlsx_path.display(),
        db_path.display(),
        table.len(),
        width
    );
    Ok(SqliteReport {
        source: xlsx_path.to_path_buf(),
        db_path,
        rows: table.len(),
        columns: width,
    })
}

/// [`xlsx_to_sqlite`] for every `.xlsx` in `dir`, in file-name order.
///
/// A failing spreadsheet does not stop the others.
pub fn xlsx_dir_to_sqlite(
    dir: &Path,
    plan: &CoercionPlan,
) -> Result<Vec<(PathBuf, Result<SqliteReport, Pdf2XlsxError>)>, Pdf2XlsxError> {
    let sheets = discover_by_extension(dir, "xlsx")?;
    debug!("Exporting {} spreadsheets from {}", sheets.len(), dir.display());
    Ok(sheets
        .into_iter()
        .map(|path| {
            let result = xlsx_to_sqlite(&path, plan);
            if let Err(ref e) = result {
                warn!("{}: {}", path.display(), e);
            }
            (path, result)
        })
        .collect())
}

/// Add an empty `TEXT` column `name` to table `xlsx` of `db_path`.
///
/// `name` must be a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn add_text_column(db_path: &Path, name: &str) -> Result<(), Pdf2XlsxError> {
    if !IDENTIFIER_RE.is_match(name) {
        return Err(Pdf2XlsxError::InvalidConfig(format!(
            "Column name '{name}' is not a plain identifier"
        )));
    }
    if !db_path.is_file() {
        return Err(Pdf2XlsxError::FileNotFound {
            path: db_path.to_path_buf(),
        });
    }
    let conn = Connection::open(db_path).map_err(|e| Pdf2XlsxError::Database {
        path: db_path.to_path_buf(),
        detail: e.to_string(),
    })?;
    conn.execute_batch(&format!("ALTER TABLE {TABLE_NAME} ADD COLUMN \"{name}\" TEXT;"))
        .map_err(|e| Pdf2XlsxError::Database {
            path: db_path.to_path_buf(),
            detail: e.to_string(),
        })?;
    info!("Added column '{}' to {}", name, db_path.display());
    Ok(())
}
