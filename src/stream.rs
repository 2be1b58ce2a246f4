//! Streaming directory conversion: emit documents as they complete.
//!
//! Unlike the eager [`crate::convert::convert_directory`], which returns only
//! after every document is done, [`convert_directory_stream`] yields one
//! [`DocumentOutcome`] per PDF as soon as it finishes. Outcomes arrive in
//! completion order; sort by `source` if order matters.

use crate::config::ConversionConfig;
use crate::convert::convert;
use crate::error::Pdf2XlsxError;
use crate::output::DocumentOutcome;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-document outcomes.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Convert every `*.pdf` in `dir`, streaming outcomes as documents finish.
///
/// # Errors
/// Only listing the directory is fatal. Per-document failures are carried
/// in each outcome's `result`.
pub fn convert_directory_stream(
    dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentStream, Pdf2XlsxError> {
    let dir = dir.as_ref();
    let documents = input::discover_documents(dir)?;
    info!(
        "Converting {} documents from {} ({} at a time)",
        documents.len(),
        dir.display(),
        config.document_concurrency
    );

    let concurrency = config.document_concurrency.max(1);
    let config = config.clone();
    let s = stream::iter(documents.into_iter().map(move |source| {
        let cfg = config.clone();
        async move {
            let result = convert(&source, &cfg).await;
            if let Err(ref e) = result {
                warn!("{}: {}", source.display(), e);
            }
            DocumentOutcome { source, result }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
