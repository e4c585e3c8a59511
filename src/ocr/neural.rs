//! Neural OCR reader backed by ONNX Runtime.
//!
//! Wraps a CTC text-recognition model (`rec.onnx` + `charset.txt` in the
//! configured model directory). The reader is a process-wide cached
//! resource: loaded once on first use and shared by every extraction call
//! behind a mutex.

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use image::{imageops::FilterType, DynamicImage};
use ort::session::Session;
use ort::value::Tensor;
use tracing::{info, warn};

use crate::error::{OcrError, OcrResult};

/// Model input height; width scales with the source aspect ratio.
const INPUT_HEIGHT: u32 = 48;
/// Upper bound on the scaled input width.
const MAX_INPUT_WIDTH: u32 = 960;

static READER: OnceLock<Option<Mutex<NeuralReader>>> = OnceLock::new();

/// Shared reader handle, initialized single-flight on first use.
///
/// Returns `None` when the model artifacts are missing or fail to load; the
/// load is not retried afterwards.
pub(super) fn shared_reader(model_dir: &Path) -> Option<&'static Mutex<NeuralReader>> {
    READER
        .get_or_init(|| match NeuralReader::load(model_dir) {
            Ok(reader) => {
                info!(model_dir = %model_dir.display(), "Neural OCR reader loaded");
                Some(Mutex::new(reader))
            }
            Err(e) => {
                warn!(model_dir = %model_dir.display(), error = %e, "Neural OCR reader unavailable");
                None
            }
        })
        .as_ref()
}

/// CTC text-recognition model with its character set.
pub(super) struct NeuralReader {
    session: Session,
    charset: Vec<String>,
}

impl NeuralReader {
    fn load(model_dir: &Path) -> OcrResult<Self> {
        let model_path = model_dir.join("rec.onnx");
        let charset_path = model_dir.join("charset.txt");

        if !model_path.exists() || !charset_path.exists() {
            return Err(OcrError::Engine {
                message: format!("model artifacts not found in {}", model_dir.display()),
            });
        }

        let session = Session::builder()
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| OcrError::Engine {
                message: format!("failed to load recognition model: {e}"),
            })?;

        let charset = std::fs::read_to_string(&charset_path)
            .map_err(|e| OcrError::Engine {
                message: format!("failed to read charset: {e}"),
            })?
            .lines()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();

        Ok(Self { session, charset })
    }

    /// Recognize text in the image with a single recognition pass.
    ///
    /// The whole source is treated as one text region; there is no layout
    /// detection stage.
    pub(super) fn recognize(&mut self, image: &DynamicImage) -> OcrResult<String> {
        let (input, width) = preprocess(image);

        let shape = [1_i64, 3, INPUT_HEIGHT as i64, width as i64];
        let tensor =
            Tensor::from_array((shape, input.into_boxed_slice())).map_err(|e| OcrError::Engine {
                message: format!("failed to build input tensor: {e}"),
            })?;

        let outputs = self
            .session
            .run(ort::inputs!["x" => tensor])
            .map_err(|e| OcrError::Engine {
                message: format!("inference failed: {e}"),
            })?;

        let (out_shape, logits) =
            outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| OcrError::Engine {
                    message: format!("failed to read output tensor: {e}"),
                })?;

        let dims: &[i64] = out_shape;
        if dims.len() != 3 {
            return Err(OcrError::Engine {
                message: format!("unexpected output shape: {dims:?}"),
            });
        }

        let steps = dims[1] as usize;
        let classes = dims[2] as usize;
        Ok(self.ctc_decode(logits, steps, classes))
    }

    /// Greedy CTC decode: argmax per step, collapse repeats, skip blank
    /// (index 0). Charset index i maps to class i+1.
    fn ctc_decode(&self, logits: &[f32], steps: usize, classes: usize) -> String {
        let mut text = String::new();
        let mut previous = 0usize;

        for step in 0..steps {
            let row = &logits[step * classes..(step + 1) * classes];
            let best = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i)
                .unwrap_or(0);

            if best != 0 && best != previous {
                if let Some(ch) = self.charset.get(best - 1) {
                    text.push_str(ch);
                }
            }
            previous = best;
        }

        text
    }
}

/// Scale to the model input height, normalize to [-1, 1], lay out as NCHW.
fn preprocess(image: &DynamicImage) -> (Vec<f32>, u32) {
    let rgb = image.to_rgb8();
    let scale = INPUT_HEIGHT as f32 / rgb.height().max(1) as f32;
    let width = ((rgb.width() as f32 * scale).round() as u32)
        .clamp(INPUT_HEIGHT, MAX_INPUT_WIDTH);

    let resized = image::imageops::resize(&rgb, width, INPUT_HEIGHT, FilterType::Triangle);

    let plane = (width * INPUT_HEIGHT) as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y * width + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }

    (data, width)
}
