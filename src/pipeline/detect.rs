//! Built-in extraction engine: heuristic table detection on pdfium text.
//!
//! No ML model is involved. For each page the engine:
//! 1. reads text segments with their bounding boxes from pdfium,
//! 2. clusters segments into rows by vertical alignment,
//! 3. groups consecutive multi-cell rows with a similar cell count into
//!    table regions,
//! 4. derives column boundaries from the left edges inside a region and
//!    assigns every segment to a column.
//!
//! This is the "stream" style of table reading: it needs aligned text, not
//! ruling lines, which suits machine-generated reports. Scanned documents
//! carry no text layer; use the OCR fallback ([`crate::ocr`]) for those.

use crate::error::Pdf2XlsxError;
use crate::pipeline::batch::PageRange;
use crate::pipeline::extract::TableEngine;
use crate::table::ExtractedTable;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

/// Tolerances of the alignment heuristics, in PDF points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDetectorConfig {
    /// Segments whose vertical centres differ by at most this share a row.
    pub row_tolerance: f32,
    /// Left edges closer than this belong to the same column.
    pub col_tolerance: f32,
    /// Minimum consecutive rows for a region to count as a table.
    pub min_rows: usize,
    /// Minimum cells per row (and columns per table).
    pub min_cols: usize,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 5.0,
            col_tolerance: 10.0,
            min_rows: 2,
            min_cols: 2,
        }
    }
}

/// Bind to the pdfium shared library.
///
/// Lookup order: `PDFIUM_LIB_PATH`, then a library next to the working
/// directory, then the system library path.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2XlsxError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2XlsxError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Open a document, mapping pdfium's load failures onto library errors.
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2XlsxError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            Pdf2XlsxError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        } else {
            Pdf2XlsxError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Positioned text, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextCell {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextCell {
    fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// The default [`TableEngine`]: pdfium text layer + alignment heuristics.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTableEngine {
    config: TableDetectorConfig,
    password: Option<String>,
}

impl PdfiumTableEngine {
    pub fn new(config: TableDetectorConfig, password: Option<String>) -> Self {
        Self { config, password }
    }

    /// Read one page's text segments as cells, sorted top-to-bottom, left-to-right.
    fn page_cells(&self, page: &PdfPage, page_num: usize) -> Result<Vec<TextCell>, Pdf2XlsxError> {
        let page_height = page.height().value;
        let text = page.text().map_err(|e| Pdf2XlsxError::Extraction {
            path: Default::default(),
            pages: page_num.to_string(),
            detail: format!("text layer unavailable: {:?}", e),
        })?;

        let mut cells = Vec::new();
        for segment in text.segments().iter() {
            let content = segment.text();
            let content = content.trim();
            if content.is_empty() {
                continue;
            }
            let bounds = segment.bounds();
            cells.push(TextCell {
                text: content.to_string(),
                x: bounds.left().value,
                y: page_height - bounds.top().value,
                width: bounds.right().value - bounds.left().value,
                height: bounds.top().value - bounds.bottom().value,
            });
        }

        cells.sort_by(|a, b| cmp_f32(a.y, b.y).then_with(|| cmp_f32(a.x, b.x)));
        Ok(cells)
    }

    /// Turn one page's cells into zero or more tables.
    pub(crate) fn detect_tables(&self, cells: &[TextCell]) -> Vec<ExtractedTable> {
        let rows = self.cluster_rows(cells);
        self.find_table_regions(&rows)
            .iter()
            .filter_map(|region| self.build_table(region))
            .collect()
    }

    fn cluster_rows<'a>(&self, cells: &'a [TextCell]) -> Vec<Vec<&'a TextCell>> {
        let mut rows: Vec<Vec<&TextCell>> = Vec::new();

        for cell in cells {
            let row = rows.iter_mut().find(|row| {
                row.first().is_some_and(|first| {
                    (cell.center_y() - first.center_y()).abs() <= self.config.row_tolerance
                })
            });
            match row {
                Some(row) => row.push(cell),
                None => rows.push(vec![cell]),
            }
        }

        for row in &mut rows {
            row.sort_by(|a, b| cmp_f32(a.x, b.x));
        }
        rows.sort_by(|a, b| {
            let ay = a.first().map(|c| c.y).unwrap_or(0.0);
            let by = b.first().map(|c| c.y).unwrap_or(0.0);
            cmp_f32(ay, by)
        });
        rows
    }

    /// Consecutive rows with ≥ `min_cols` cells whose cell count stays within ±1.
    fn find_table_regions<'a>(&self, rows: &[Vec<&'a TextCell>]) -> Vec<Vec<Vec<&'a TextCell>>> {
        let mut regions = Vec::new();
        let mut current: Vec<Vec<&TextCell>> = Vec::new();
        let mut expected_cols: Option<usize> = None;

        for row in rows {
            let n = row.len();
            if n < self.config.min_cols {
                if current.len() >= self.config.min_rows {
                    regions.push(std::mem::take(&mut current));
                }
                current.clear();
                expected_cols = None;
                continue;
            }

            match expected_cols {
                Some(expected) if n.abs_diff(expected) <= 1 => current.push(row.clone()),
                _ => {
                    if current.len() >= self.config.min_rows {
                        regions.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(row.clone());
                    expected_cols = Some(n);
                }
            }
        }

        if current.len() >= self.config.min_rows {
            regions.push(current);
        }
        regions
    }

    fn build_table(&self, region: &[Vec<&TextCell>]) -> Option<ExtractedTable> {
        let boundaries = self.column_boundaries(region);
        let num_cols = boundaries.len().saturating_sub(1);
        if num_cols < self.config.min_cols {
            return None;
        }

        let rows = region
            .iter()
            .map(|row| {
                let mut out = vec![String::new(); num_cols];
                for cell in row {
                    let col = column_index(cell, &boundaries).min(num_cols - 1);
                    if out[col].is_empty() {
                        out[col] = cell.text.clone();
                    } else {
                        out[col].push(' ');
                        out[col].push_str(&cell.text);
                    }
                }
                out
            })
            .collect();
        Some(ExtractedTable::new(rows))
    }

    /// Clustered left edges plus the region's right edge.
    fn column_boundaries(&self, region: &[Vec<&TextCell>]) -> Vec<f32> {
        let mut xs: Vec<f32> = region.iter().flatten().map(|c| c.x).collect();
        xs.sort_by(|a, b| cmp_f32(*a, *b));

        let Some((&first, rest)) = xs.split_first() else {
            return Vec::new();
        };
        let mut boundaries = vec![first];
        for &x in rest {
            if boundaries.last().is_some_and(|&last| x - last > self.config.col_tolerance) {
                boundaries.push(x);
            }
        }

        if let Some(right) = region
            .iter()
            .flatten()
            .map(|c| c.right())
            .max_by(|a, b| cmp_f32(*a, *b))
        {
            boundaries.push(right);
        }
        boundaries
    }
}

fn column_index(cell: &TextCell, boundaries: &[f32]) -> usize {
    let center = cell.center_x();
    boundaries
        .windows(2)
        .position(|w| center >= w[0] && center < w[1])
        .unwrap_or_else(|| boundaries.len().saturating_sub(2))
}

impl TableEngine for PdfiumTableEngine {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn page_count(&self, pdf_path: &Path) -> Result<usize, Pdf2XlsxError> {
        let pdfium = bind_pdfium()?;
        let document = load_document(&pdfium, pdf_path, self.password.as_deref())?;
        let count = document.pages().len() as usize;
        info!("PDF loaded: {} pages", count);
        Ok(count)
    }

    fn extract_tables(
        &self,
        pdf_path: &Path,
        pages: &PageRange,
    ) -> Result<Vec<ExtractedTable>, Pdf2XlsxError> {
        let pdfium = bind_pdfium()?;
        let document = load_document(&pdfium, pdf_path, self.password.as_deref())?;
        let doc_pages = document.pages();
        let total = doc_pages.len() as usize;

        let mut tables = Vec::new();
        for idx in pages.to_indices() {
            if idx >= total {
                return Err(Pdf2XlsxError::PageOutOfRange {
                    page: idx + 1,
                    total,
                });
            }
            let page = doc_pages
                .get(idx as u16)
                .map_err(|e| Pdf2XlsxError::Extraction {
                    path: pdf_path.to_path_buf(),
                    pages: (idx + 1).to_string(),
                    detail: format!("{:?}", e),
                })?;

            let cells = self.page_cells(&page, idx + 1).map_err(|e| match e {
                Pdf2XlsxError::Extraction { pages, detail, .. } => Pdf2XlsxError::Extraction {
                    path: pdf_path.to_path_buf(),
                    pages,
                    detail,
                },
                other => other,
            })?;
            let found = self.detect_tables(&cells);
            debug!("Page {}: {} cells, {} tables", idx + 1, cells.len(), found.len());
            tables.extend(found);
        }
        Ok(tables)
    }
}
