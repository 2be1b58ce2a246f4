//! OCR fallback for scanned documents.
//!
//! Scans carry no text layer, so the table detector finds nothing in them.
//! This path pulls the raster images embedded in each page, binarizes them
//! and runs Tesseract over each one, writing the recognized text to
//! `{stem}.txt` next to the source.
//!
//! Image extraction and binarization are always compiled. Recognition needs
//! the `ocr` feature (Tesseract via `leptess`); without it [`recognize`]
//! returns [`Pdf2XlsxError::OcrUnavailable`].

use crate::error::Pdf2XlsxError;
use crate::pipeline::detect::{bind_pdfium, load_document};
use crate::pipeline::input;
use image::{DynamicImage, GrayImage, Luma};
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recognition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract languages. Default: `rus+eng`.
    pub language: String,
    /// Tesseract page segmentation mode. Default: 6 (a single uniform block).
    pub page_segmentation_mode: u8,
    /// Gray levels above this become white, the rest black. Default: 150.
    pub threshold: u8,
    /// PDF user password for encrypted documents.
    pub password: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "rus+eng".to_string(),
            page_segmentation_mode: 6,
            threshold: 150,
            password: None,
        }
    }
}

/// What an OCR run produced.
#[derive(Debug, Clone, Serialize)]
pub struct OcrOutput {
    pub source: PathBuf,
    /// `{stem}.txt`
    pub text_path: PathBuf,
    /// Embedded images found in the document.
    pub images: usize,
    /// Characters of recognized text written.
    pub chars: usize,
    pub duration_ms: u64,
}

/// Grayscale, then a fixed threshold: `> threshold` → 255, else 0.
pub fn binarize(image: &DynamicImage, threshold: u8) -> GrayImage {
    let mut gray = image.to_luma8();
    for Luma([v]) in gray.pixels_mut() {
        *v = if *v > threshold { 255 } else { 0 };
    }
    gray
}

/// Every raster image embedded in the document, with its 1-indexed page. Blocking.
pub fn extract_page_images(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<(usize, DynamicImage)>, Pdf2XlsxError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let mut images = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            match image_object.get_raw_image() {
                Ok(image) => images.push((idx + 1, image)),
                Err(e) => warn!("Page {}: skipping undecodable image: {:?}", idx + 1, e),
            }
        }
    }
    debug!("Found {} embedded images in {}", images.len(), pdf_path.display());
    Ok(images)
}

/// Run Tesseract over one binarized image.
#[cfg(feature = "ocr")]
pub fn recognize(image: &GrayImage, config: &OcrConfig) -> Result<String, Pdf2XlsxError> {
    use leptess::{LepTess, Variable};

    let ocr_err = |detail: String| Pdf2XlsxError::Ocr {
        path: PathBuf::new(),
        detail,
    };

    let mut lt = LepTess::new(None, &config.language)
        .map_err(|e| ocr_err(format!("Failed to initialize Tesseract: {}", e)))?;
    lt.set_variable(
        Variable::TesseditPagesegMode,
        &config.page_segmentation_mode.to_string(),
    )
    .map_err(|e| ocr_err(format!("Failed to set PSM: {}", e)))?;

    let mut png = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| ocr_err(format!("Failed to encode image to PNG: {}", e)))?;
    lt.set_image_from_mem(png.get_ref())
        .map_err(|e| ocr_err(format!("Failed to load image: {}", e)))?;

    lt.get_utf8_text()
        .map_err(|e| ocr_err(format!("Recognition failed: {}", e)))
}

/// Run Tesseract over one binarized image.
#[cfg(not(feature = "ocr"))]
pub fn recognize(_image: &GrayImage, _config: &OcrConfig) -> Result<String, Pdf2XlsxError> {
    Err(Pdf2XlsxError::OcrUnavailable)
}

/// OCR every embedded image of `pdf_path` into `{stem}.txt`.
///
/// # Errors
/// [`Pdf2XlsxError::Ocr`] when the document has no embedded images or no
/// text was recognized in any of them; the text file is not written then.
pub async fn ocr_document(
    pdf_path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<OcrOutput, Pdf2XlsxError> {
    let source = input::resolve_local(pdf_path)?;
    let config = config.clone();
    tokio::task::spawn_blocking(move || ocr_document_blocking(source, &config))
        .await
        .map_err(|e| Pdf2XlsxError::Internal(format!("OCR task panicked: {}", e)))?
}

fn ocr_document_blocking(source: PathBuf, config: &OcrConfig) -> Result<OcrOutput, Pdf2XlsxError> {
    let start = Instant::now();
    let stem = input::document_stem(&source)?;
    let nothing = |detail: &str| Pdf2XlsxError::Ocr {
        path: source.clone(),
        detail: detail.to_string(),
    };

    let images = extract_page_images(&source, config.password.as_deref())?;
    if images.is_empty() {
        return Err(nothing("no embedded images to recognize"));
    }
    info!("OCR: {} images in {}", images.len(), source.display());

    let mut text = String::new();
    for (page, image) in &images {
        let recognized = recognize(&binarize(image, config.threshold), config).map_err(|e| match e {
            Pdf2XlsxError::Ocr { detail, .. } => Pdf2XlsxError::Ocr {
                path: source.clone(),
                detail: format!("page {}: {}", page, detail),
            },
            other => other,
        })?;
        debug!("Page {}: {} chars recognized", page, recognized.len());
        text.push_str(&recognized);
        if !recognized.is_empty() && !recognized.ends_with('\n') {
            text.push('\n');
        }
    }
    if text.trim().is_empty() {
        return Err(nothing("no text recognized"));
    }

    let dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
    let text_path = dir.join(format!("{}.txt", stem));
    std::fs::write(&text_path, &text).map_err(|e| Pdf2XlsxError::WriteFailed {
        path: text_path.clone(),
        detail: e.to_string(),
    })?;

    let output = OcrOutput {
        source,
        text_path,
        images: images.len(),
        chars: text.chars().count(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "OCR complete: {} ({} chars) in {}ms",
        output.text_path.display(),
        output.chars,
        output.duration_ms
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn threshold_is_strictly_greater() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([150, 150, 150]));
        img.put_pixel(1, 0, Rgb([151, 151, 151]));
        img.put_pixel(2, 0, Rgb([10, 10, 10]));

        let bin = binarize(&DynamicImage::ImageRgb8(img), 150);
        let values: Vec<u8> = bin.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 255, 0]);
    }

    #[test]
    fn binarized_output_is_two_level() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([(x * 16 + y) as u8]));
        let bin = binarize(&DynamicImage::ImageLuma8(img), 100);
        assert!(bin.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(bin.dimensions(), (16, 16));
    }

    #[test]
    fn default_config() {
        let c = OcrConfig::default();
        assert_eq!(c.language, "rus+eng");
        assert_eq!(c.page_segmentation_mode, 6);
        assert_eq!(c.threshold, 150);
    }

    #[cfg(not(feature = "ocr"))]
    #[test]
    fn recognition_without_feature_is_unavailable() {
        let img = GrayImage::new(4, 4);
        assert!(matches!(
            recognize(&img, &OcrConfig::default()),
            Err(Pdf2XlsxError::OcrUnavailable)
        ));
    }

    #[test]
    fn broken_document_yields_an_error_not_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.7\ntruncated").unwrap();
        let password = String::from("secret");
        assert!(extract_page_images(&path, Some(password.as_str())).is_err());
    }

    #[tokio::test]
    async fn missing_pdf_is_input_error() {
        let err = ocr_document("/no/such/scan.pdf", &OcrConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::FileNotFound { .. }));
    }
}
