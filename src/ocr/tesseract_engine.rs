//! Tesseract-backed fallback OCR engine.

use std::io::Cursor;

use image::DynamicImage;
use tesseract::Tesseract;

use crate::error::{OcrError, OcrResult};

/// Run Tesseract over the full image and return the raw text.
pub(super) fn recognize(image: &DynamicImage) -> OcrResult<String> {
    // Tesseract reads encoded image bytes via leptonica.
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| OcrError::Decode {
            message: format!("failed to encode image for Tesseract: {e}"),
        })?;

    let text = Tesseract::new(None, Some("eng"))
        .map_err(|e| OcrError::Engine {
            message: format!("failed to initialize Tesseract: {e}"),
        })?
        .set_image_from_mem(&png)
        .map_err(|e| OcrError::Engine {
            message: format!("failed to load image into Tesseract: {e}"),
        })?
        .get_text()
        .map_err(|e| OcrError::Engine {
            message: format!("Tesseract recognition failed: {e}"),
        })?;

    Ok(text)
}
