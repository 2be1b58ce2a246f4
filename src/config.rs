//! Configuration types for PDF-to-spreadsheet conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Nothing in the library reads a
//! process-wide working directory: every artifact location is derived from
//! the source document's own path, so tests can point the pipeline at a
//! temporary directory and nothing else.

use crate::error::Pdf2XlsxError;
use crate::pipeline::detect::TableDetectorConfig;
use crate::pipeline::extract::TableEngine;
use crate::progress::ProgressCallback;
use crate::table::ColumnNaming;
use std::fmt;
use std::sync::Arc;

/// Pages per extraction window unless configured otherwise.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Worksheet name used for every artifact.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Configuration for a PDF-to-spreadsheet conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2xlsx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .window_size(50)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.window_size, 50);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Pages handed to the extraction engine per call. Default: 100.
    ///
    /// Large documents are never extracted in one call: the engine's memory
    /// use grows with the page range, and a window boundary is also the unit
    /// of progress reporting.
    pub window_size: usize,

    /// Windows of one document extracted at the same time. Default: 4.
    pub concurrency: usize,

    /// Documents converted at the same time by the directory APIs. Default: 2.
    pub document_concurrency: usize,

    /// Header scheme written to every artifact. Default: [`ColumnNaming::Generic`].
    pub column_naming: ColumnNaming,

    /// Worksheet name of every artifact. Default: `Sheet1`.
    pub sheet_name: String,

    /// Delete already-written intermediates when a sibling window fails. Default: true.
    pub cleanup_on_failure: bool,

    /// PDF user password for encrypted documents (default engine only).
    pub password: Option<String>,

    /// Tolerances of the built-in pdfium table detector.
    pub detector: TableDetectorConfig,

    /// Pre-constructed extraction engine. Takes precedence over the built-in
    /// pdfium detector.
    pub engine: Option<Arc<dyn TableEngine>>,

    /// Optional per-window progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            concurrency: 4,
            document_concurrency: 2,
            column_naming: ColumnNaming::default(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            cleanup_on_failure: true,
            password: None,
            detector: TableDetectorConfig::default(),
            engine: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("window_size", &self.window_size)
            .field("concurrency", &self.concurrency)
            .field("document_concurrency", &self.document_concurrency)
            .field("column_naming", &self.column_naming)
            .field("sheet_name", &self.sheet_name)
            .field("cleanup_on_failure", &self.cleanup_on_failure)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("detector", &self.detector)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    /// Not clamped: a zero window size is rejected by [`Self::build`].
    pub fn window_size(mut self, pages: usize) -> Self {
        self.config.window_size = pages;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn document_concurrency(mut self, n: usize) -> Self {
        self.config.document_concurrency = n.max(1);
        self
    }

    pub fn column_naming(mut self, naming: ColumnNaming) -> Self {
        self.config.column_naming = naming;
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = name.into();
        self
    }

    pub fn cleanup_on_failure(mut self, v: bool) -> Self {
        self.config.cleanup_on_failure = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn detector(mut self, detector: TableDetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn TableEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2XlsxError> {
        let c = &self.config;
        if c.window_size == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(
                "Window size must be ≥ 1 page".into(),
            ));
        }
        if c.concurrency == 0 || c.document_concurrency == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        validate_sheet_name(&c.sheet_name)?;
        Ok(self.config)
    }
}

/// Excel rejects empty names, names over 31 chars and a handful of characters.
fn validate_sheet_name(name: &str) -> Result<(), Pdf2XlsxError> {
    const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
    if name.is_empty() || name.chars().count() > 31 || name.contains(FORBIDDEN) {
        return Err(Pdf2XlsxError::InvalidConfig(format!(
            "Invalid sheet name '{name}': 1–31 chars, none of []:*?/\\"
        )));
    }
    Ok(())
}
