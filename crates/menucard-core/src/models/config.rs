//! Configuration structures for the menu reading pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::menu::AssociationStrategy;

/// Main configuration for the menucard pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Menu component detector configuration.
    pub detection: DetectionConfig,

    /// Component-to-item association.
    pub association: AssociationConfig,

    /// Text recognition engine configuration.
    pub ocr: OcrConfig,

    /// Per-item extraction behaviour.
    pub extraction: ExtractionConfig,

    /// Model file locations.
    pub models: ModelConfig,
}

/// Menu component detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum class score to keep a box (0.0 - 1.0).
    pub confidence_threshold: f32,

    /// IoU above which same-class boxes are suppressed.
    pub nms_threshold: f32,

    /// Square model input size in pixels.
    pub input_size: u32,

    /// Upper bound on boxes returned per page.
    pub max_detections: usize,

    /// Class count of the detection head, one per component role.
    pub num_classes: usize,

    /// TrueType font for labels on annotated previews.
    pub font_path: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
            max_detections: 300,
            num_classes: 4,
            font_path: None,
        }
    }
}

/// How components are matched to item boxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    pub strategy: AssociationStrategy,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Split crops into text lines before recognition.
    pub enable_detection: bool,

    /// Correct upside-down lines with the angle classifier.
    pub enable_classification: bool,

    /// Line detection probability threshold (0.0 - 1.0).
    pub detection_threshold: f32,

    /// Minimum mean score of a detected line.
    pub box_threshold: f32,

    /// Recognition confidence threshold (0.0 - 1.0).
    pub recognition_threshold: f32,

    /// Number of CPU threads per model session.
    pub num_threads: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enable_detection: true,
            enable_classification: true,
            detection_threshold: 0.3,
            box_threshold: 0.6,
            recognition_threshold: 0.0, // CTC confidences are low on short price crops
            num_threads: 4,
        }
    }
}

/// Per-item extraction behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Recognise items concurrently; output order is unchanged.
    pub parallel: bool,

    /// Attempts per recognition call (1 = no retry).
    pub max_attempts: u32,

    /// Base delay before the first retry, doubled for each further attempt.
    pub retry_backoff_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_attempts: 1,
            retry_backoff_ms: 50,
        }
    }
}

/// Model file names, resolved against `model_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Menu component detector (YOLOv8 export).
    pub menu_model: String,

    /// Text line detection model file name.
    pub detection_model: String,

    /// Angle classification model file name (optional).
    pub classification_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            menu_model: "menu_items.onnx".to_string(),
            detection_model: "det.onnx".to_string(),
            classification_model: "cls.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl ModelConfig {
    /// All model files paired with whether the reader requires them.
    pub fn files(&self) -> [(&str, bool); 5] {
        [
            (self.menu_model.as_str(), true),
            (self.recognition_model.as_str(), true),
            (self.detection_model.as_str(), false),
            (self.classification_model.as_str(), false),
            (self.dictionary.as_str(), false),
        ]
    }
}

impl MenuConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MenuConfig =
            serde_json::from_str(r#"{"extraction": {"max_attempts": 3}}"#).unwrap();
        assert_eq!(config.extraction.max_attempts, 3);
        assert_eq!(config.extraction.retry_backoff_ms, 50);
        assert_eq!(config.detection.input_size, 640);
        assert_eq!(config.association.strategy, AssociationStrategy::Containment);
    }

    #[test]
    fn test_overlap_strategy_from_json() {
        let config: MenuConfig = serde_json::from_str(
            r#"{"association": {"strategy": {"overlap": {"threshold": 0.5}}}}"#,
        )
        .unwrap();
        assert_eq!(
            config.association.strategy,
            AssociationStrategy::Overlap { threshold: 0.5 }
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = MenuConfig::default();
        config.association.strategy = AssociationStrategy::overlap();
        config.save(&path).unwrap();

        let loaded = MenuConfig::from_file(&path).unwrap();
        assert_eq!(loaded.association.strategy, config.association.strategy);
        assert_eq!(loaded.model_path("x.onnx"), PathBuf::from("models").join("x.onnx"));
    }
}
