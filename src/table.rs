//! In-memory table model shared by every pipeline stage.
//!
//! An [`ExtractedTable`] is deliberately schema-less: rows are plain vectors
//! of strings and may differ in length, because tables detected in different
//! page windows of the same document rarely agree on column count. Shape is
//! only imposed at the end, by [`ExtractedTable::normalized`], which pads every
//! row to the widest one and sanitises cell text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches one embedded line break, treating CRLF as a single break.
static LINE_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

/// Ordered rows of string cells produced by the extraction engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// A table with no rows — what a window with no detected tables yields.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenate tables row-wise, preserving the iteration order.
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = ExtractedTable>,
    {
        let mut rows = Vec::new();
        for table in tables {
            rows.extend(table.rows);
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Pad every row with empty cells up to `width`. Longer rows are kept intact.
    pub fn pad_to(&mut self, width: usize) {
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            }
        }
    }

    /// Replace every embedded line break in every cell with a single space.
    pub fn sanitize_cells(&mut self) {
        for cell in self.rows.iter_mut().flatten() {
            if let std::borrow::Cow::Owned(clean) = LINE_BREAK_RE.replace_all(cell, " ") {
                *cell = clean;
            }
        }
    }

    /// Rectangular, newline-free copy of this table: the shape of a final artifact.
    pub fn normalized(mut self) -> Self {
        let width = self.width();
        self.pad_to(width);
        self.sanitize_cells();
        self
    }
}

/// Header policy applied to every written artifact.
///
/// Raw headers coming out of the extraction engine are engine-dependent and
/// unreliable, so artifacts never carry them; instead the caller picks one of
/// these synthetic schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColumnNaming {
    /// `column_0`, `column_1`, … (default)
    #[default]
    Generic,
    /// `0`, `1`, … — positional indices, as a pandas frame without headers has.
    Positional,
}

impl ColumnNaming {
    /// Header for the column at `index`.
    pub fn header(&self, index: usize) -> String {
        match self {
            ColumnNaming::Generic => format!("column_{index}"),
            ColumnNaming::Positional => index.to_string(),
        }
    }

    /// Headers for a table `width` columns wide.
    pub fn headers(&self, width: usize) -> Vec<String> {
        (0..width).map(|i| self.header(i)).collect()
    }
}
