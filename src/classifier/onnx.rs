//! ONNX Runtime inference for the railway-issue classifier.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::{ClassManifest, ClassificationResult, INPUT_SIZE};
use crate::error::{ClassifierError, ClassifierResult};

/// Loaded model, class list, and resolved input name.
///
/// The session is mutex-guarded: one shared instance serves all
/// classification calls.
pub(super) struct LoadedModel {
    session: Mutex<Session>,
    input_name: String,
    classes: Vec<String>,
}

impl LoadedModel {
    pub(super) fn load(model_path: &Path, classes_path: &Path) -> ClassifierResult<Self> {
        if !model_path.exists() || !classes_path.exists() {
            return Err(ClassifierError::ModelUnavailable {
                message: format!(
                    "artifacts not found: {} / {}",
                    model_path.display(),
                    classes_path.display()
                ),
            });
        }

        let session = Session::builder()
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| ClassifierError::ModelUnavailable {
                message: format!("failed to load model: {e}"),
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| ClassifierError::ModelUnavailable {
                message: "model has no inputs".to_string(),
            })?;

        let manifest_raw =
            std::fs::read_to_string(classes_path).map_err(|e| ClassifierError::ModelUnavailable {
                message: format!("failed to read class manifest: {e}"),
            })?;
        let manifest: ClassManifest =
            serde_json::from_str(&manifest_raw).map_err(|e| ClassifierError::ModelUnavailable {
                message: format!("invalid class manifest: {e}"),
            })?;

        if manifest.classes.is_empty() {
            return Err(ClassifierError::ModelUnavailable {
                message: "class manifest lists no classes".to_string(),
            });
        }

        info!(
            model = %model_path.display(),
            classes = manifest.classes.len(),
            "Classifier model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            classes: manifest.classes,
        })
    }

    pub(super) fn predict(&self, image_bytes: &[u8]) -> ClassifierResult<ClassificationResult> {
        let input = preprocess(image_bytes)?;

        let shape = [1_i64, INPUT_SIZE as i64, INPUT_SIZE as i64, 3];
        let tensor = Tensor::from_array((shape, input.into_boxed_slice())).map_err(|e| {
            ClassifierError::Inference {
                message: format!("failed to build input tensor: {e}"),
            }
        })?;

        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| ClassifierError::Inference {
                message: format!("inference failed: {e}"),
            })?;

        let (_, probs) =
            outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ClassifierError::Inference {
                    message: format!("failed to read output tensor: {e}"),
                })?;

        if probs.len() < self.classes.len() {
            return Err(ClassifierError::Inference {
                message: format!(
                    "output has {} values for {} classes",
                    probs.len(),
                    self.classes.len()
                ),
            });
        }

        let mut best_idx = 0usize;
        let mut best_prob = f32::MIN;
        let mut probabilities = HashMap::with_capacity(self.classes.len());
        for (idx, class) in self.classes.iter().enumerate() {
            let p = probs[idx];
            probabilities.insert(class.clone(), p as f64);
            if p > best_prob {
                best_prob = p;
                best_idx = idx;
            }
        }

        Ok(ClassificationResult {
            category: Some(self.classes[best_idx].clone()),
            confidence: best_prob as f64,
            probabilities,
            model_used: true,
        })
    }
}

/// Decode to RGB, resize to the fixed square input, scale pixels to [0, 1],
/// lay out as NHWC.
fn preprocess(image_bytes: &[u8]) -> ClassifierResult<Vec<f32>> {
    let image = image::load_from_memory(image_bytes).map_err(|e| ClassifierError::Decode {
        message: format!("failed to decode image: {e}"),
    })?;

    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let mut data = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
    for pixel in resized.pixels() {
        for c in 0..3 {
            data.push(pixel[c] as f32 / 255.0);
        }
    }

    Ok(data)
}
