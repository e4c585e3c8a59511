//! Ticket OCR pipeline: source decoding, engine selection, and fallback.
//!
//! Two engines are supported, both optional capabilities: a neural reader
//! (higher accuracy, ONNX-backed, feature `onnx`) and Tesseract (feature
//! `tesseract`). Absence of an engine is a runtime configuration, not an
//! error: extraction yields an empty string and callers treat that as
//! "no text".

#[cfg(feature = "onnx")]
mod neural;
#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "tesseract")]
mod tesseract_engine;

use std::path::PathBuf;
use std::str::FromStr;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::ticket::{self, TrainDetails};

/// Selectable OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// ONNX-backed neural reader, preferred for accuracy.
    Neural,
    /// Tesseract, used as the fallback engine.
    Tesseract,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Neural => write!(f, "neural"),
            EngineKind::Tesseract => write!(f, "tesseract"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "neural" | "easyocr" => Ok(EngineKind::Neural),
            "tesseract" => Ok(EngineKind::Tesseract),
            _ => Err(format!("Unknown OCR engine: {}", s)),
        }
    }
}

/// Ticket text extractor with engine selection and fallback.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    default_engine: EngineKind,
    model_dir: PathBuf,
}

impl TextExtractor {
    /// Create an extractor with the given default engine and neural model
    /// directory.
    pub fn new(default_engine: EngineKind, model_dir: PathBuf) -> Self {
        Self {
            default_engine,
            model_dir,
        }
    }

    /// Extract raw text from a ticket image or PDF.
    ///
    /// An explicit `engine` wins over the configured default. When the
    /// default neural engine is unavailable or yields only whitespace, the
    /// Tesseract engine is tried if present. Decode failures and missing
    /// engines yield an empty string, never an error.
    pub fn extract_text(&self, file_data: &[u8], filename: &str, engine: Option<EngineKind>) -> String {
        let image = match image_from_file(file_data, filename) {
            Some(image) => image,
            None => {
                warn!(filename, "Could not decode ticket source, no text extracted");
                return String::new();
            }
        };

        match engine {
            Some(EngineKind::Neural) => self.neural_text(&image).unwrap_or_default(),
            Some(EngineKind::Tesseract) => self.tesseract_text(&image).unwrap_or_default(),
            None => match self.default_engine {
                EngineKind::Tesseract => self.tesseract_text(&image).unwrap_or_default(),
                EngineKind::Neural => {
                    let text = self.neural_text(&image).unwrap_or_default();
                    if text.trim().is_empty() {
                        debug!("Neural reader produced no text, trying Tesseract");
                        self.tesseract_text(&image).unwrap_or_default()
                    } else {
                        text
                    }
                }
            },
        }
    }

    /// Full pipeline: OCR the ticket source and parse structured train
    /// details, attaching the truncated raw text.
    pub fn extract_train_details(&self, file_data: &[u8], filename: &str) -> TrainDetails {
        let raw_text = self.extract_text(file_data, filename, None);
        ticket::parse(&raw_text).with_raw_text(&raw_text)
    }

    #[cfg(feature = "onnx")]
    fn neural_text(&self, image: &DynamicImage) -> Option<String> {
        let reader = neural::shared_reader(&self.model_dir)?;
        let mut reader = reader.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match reader.recognize(image) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Neural OCR failed");
                None
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    fn neural_text(&self, _image: &DynamicImage) -> Option<String> {
        debug!("Neural OCR engine not compiled in");
        None
    }

    #[cfg(feature = "tesseract")]
    fn tesseract_text(&self, image: &DynamicImage) -> Option<String> {
        match tesseract_engine::recognize(image) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Tesseract OCR failed");
                None
            }
        }
    }

    #[cfg(not(feature = "tesseract"))]
    fn tesseract_text(&self, _image: &DynamicImage) -> Option<String> {
        debug!("Tesseract OCR engine not compiled in");
        None
    }
}

/// Decode a ticket source into an image.
///
/// PDF sources are rasterized from the first page only; multi-page tickets
/// are out of scope. Returns `None` when the source cannot be decoded or the
/// required rasterizer is not compiled in.
fn image_from_file(file_data: &[u8], filename: &str) -> Option<DynamicImage> {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    if ext == "pdf" {
        #[cfg(feature = "pdf")]
        {
            return pdf::first_page_image(file_data);
        }
        #[cfg(not(feature = "pdf"))]
        {
            warn!("PDF rasterization not compiled in, ticket PDF ignored");
            return None;
        }
    }

    match image::load_from_memory(file_data) {
        Ok(image) => Some(image),
        Err(e) => {
            debug!(error = %e, "Ticket image decode failed");
            None
        }
    }
}
