//! First-page PDF rasterization for ticket uploads.
//!
//! Multi-page tickets are out of scope: only the front page is read.

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::warn;

/// Render width in pixels for the rasterized page.
const RENDER_WIDTH: i32 = 1600;

/// Rasterize the first page of a PDF to an image.
///
/// Returns `None` when the pdfium library cannot be bound or the document
/// cannot be rendered; callers treat that as an undecodable source.
pub(super) fn first_page_image(file_data: &[u8]) -> Option<DynamicImage> {
    let pdfium = match Pdfium::bind_to_system_library() {
        Ok(bindings) => Pdfium::new(bindings),
        Err(e) => {
            warn!(error = %e, "pdfium library not available, PDF ticket ignored");
            return None;
        }
    };

    let document = match pdfium.load_pdf_from_byte_slice(file_data, None) {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, "Failed to open ticket PDF");
            return None;
        }
    };

    let page = document.pages().first().ok()?;
    let config = PdfRenderConfig::new().set_target_width(RENDER_WIDTH);

    match page.render_with_config(&config) {
        Ok(bitmap) => Some(bitmap.as_image()),
        Err(e) => {
            warn!(error = %e, "Failed to render ticket PDF page");
            None
        }
    }
}
