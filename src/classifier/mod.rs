//! Image classifier adapter over an offline-trained railway-issue model.
//!
//! Wraps an ONNX export of the trained classifier (feature `onnx`). Model
//! and class list load lazily once per process; a failed load is cached and
//! every later call reports the model as unavailable instead of retrying.

#[cfg(feature = "onnx")]
mod onnx;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ClassifierConfig;

/// Model input resolution (square), matching training.
pub const INPUT_SIZE: u32 = 300;

/// Outcome of one classification pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Predicted class name (e.g. "fire_smoke"), unset when the model is
    /// unavailable or inference failed.
    pub category: Option<String>,
    /// Probability mass of the selected category, in [0, 1].
    pub confidence: f64,
    /// Full class-to-probability mapping; sums to ~1 when a category is
    /// produced.
    pub probabilities: HashMap<String, f64>,
    /// Whether the offline model actually ran.
    pub model_used: bool,
}

impl ClassificationResult {
    /// Result representing an unavailable or failed model.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Anything that can classify a railway-issue image.
///
/// Injected into the triage orchestrator so decision policy is testable
/// without model artifacts.
pub trait IssueClassifier: Send + Sync {
    /// Classify raw image bytes. Never fails: an unusable model yields
    /// [`ClassificationResult::unavailable`].
    fn classify(&self, image_bytes: &[u8]) -> ClassificationResult;
}

/// Class manifest stored next to the model
/// (`{"classes": [...], "indices": {...}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ClassManifest {
    pub classes: Vec<String>,
    #[serde(default)]
    pub indices: HashMap<String, usize>,
}

/// ONNX-backed classifier with lazy single-flight model loading.
pub struct OnnxClassifier {
    config: ClassifierConfig,
    #[cfg(feature = "onnx")]
    loaded: OnceLock<Option<onnx::LoadedModel>>,
    #[cfg(not(feature = "onnx"))]
    loaded: OnceLock<Option<()>>,
}

impl OnnxClassifier {
    /// Create a classifier for the configured model artifacts. Nothing is
    /// loaded until the first classification call.
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            loaded: OnceLock::new(),
        }
    }
}

impl IssueClassifier for OnnxClassifier {
    #[cfg(feature = "onnx")]
    fn classify(&self, image_bytes: &[u8]) -> ClassificationResult {
        let loaded = self.loaded.get_or_init(|| {
            match onnx::LoadedModel::load(&self.config.model_path, &self.config.classes_path) {
                Ok(model) => Some(model),
                Err(e) => {
                    warn!(error = %e, "Classifier model load failed, classifier disabled");
                    None
                }
            }
        });

        match loaded {
            Some(model) => match model.predict(image_bytes) {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Classifier inference failed");
                    ClassificationResult {
                        model_used: true,
                        ..ClassificationResult::unavailable()
                    }
                }
            },
            None => ClassificationResult::unavailable(),
        }
    }

    #[cfg(not(feature = "onnx"))]
    fn classify(&self, _image_bytes: &[u8]) -> ClassificationResult {
        self.loaded.get_or_init(|| {
            warn!(
                model_path = %self.config.model_path.display(),
                "ONNX backend not compiled in, classifier disabled"
            );
            None
        });
        ClassificationResult::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            model_path: PathBuf::from("/nonexistent/model.onnx"),
            classes_path: PathBuf::from("/nonexistent/classes.json"),
            confidence_threshold: 0.5,
        }
    }

    #[test]
    fn test_missing_artifacts_degrade_without_error() {
        let classifier = OnnxClassifier::new(config());
        let result = classifier.classify(b"not an image");
        assert_eq!(result.category, None);
        assert_eq!(result.confidence, 0.0);
        assert!(result.probabilities.is_empty());
        assert!(!result.model_used);

        // The failed load is cached; repeated calls behave identically.
        let again = classifier.classify(b"not an image");
        assert_eq!(again.category, None);
        assert!(!again.model_used);
    }

    #[test]
    fn test_class_manifest_parses_with_and_without_indices() {
        let manifest: ClassManifest = serde_json::from_str(
            r#"{"classes": ["crowd", "fire_smoke"], "indices": {"crowd": 0, "fire_smoke": 1}}"#,
        )
        .unwrap();
        assert_eq!(manifest.classes.len(), 2);
        assert_eq!(manifest.indices["fire_smoke"], 1);

        let manifest: ClassManifest =
            serde_json::from_str(r#"{"classes": ["trash"]}"#).unwrap();
        assert_eq!(manifest.classes, vec!["trash"]);
        assert!(manifest.indices.is_empty());
    }

    #[test]
    fn test_unavailable_result_shape() {
        let result = ClassificationResult::unavailable();
        assert_eq!(result.category, None);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.model_used);
    }
}
