//! OCR engine orchestrating line detection, angle classification, and recognition.

use std::cmp::Ordering;
#[cfg(feature = "native")]
use std::path::Path;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, trace};

use crate::error::OcrError;
use crate::models::config::OcrConfig;
use menucard_inference::InferenceBackend;

use super::{
    RecognizedLine, TextRecognition,
    classifier::AngleClassifier,
    detector::TextDetector,
    preprocessing::ImagePreprocessor,
    recognizer::TextRecognizer,
};

/// Lines whose tops differ by less than this are on the same row.
const SAME_ROW_PX: f32 = 10.0;

/// OCR engine turning a component crop into ranked text lines.
pub struct OcrEngine<B: InferenceBackend> {
    detector: Option<TextDetector<B>>,
    classifier: Option<AngleClassifier<B>>,
    recognizer: TextRecognizer<B>,
    preprocessor: ImagePreprocessor,
    config: OcrConfig,
}

/// Builder for OcrEngine.
pub struct OcrEngineBuilder<B: InferenceBackend> {
    detector: Option<TextDetector<B>>,
    classifier: Option<AngleClassifier<B>>,
    recognizer: Option<TextRecognizer<B>>,
    config: OcrConfig,
}

impl<B: InferenceBackend> OcrEngineBuilder<B> {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            detector: None,
            classifier: None,
            recognizer: None,
            config: OcrConfig::default(),
        }
    }

    /// Set the text line detector.
    pub fn with_detector(mut self, detector: TextDetector<B>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Set the angle classifier.
    pub fn with_classifier(mut self, classifier: AngleClassifier<B>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the text recognizer.
    pub fn with_recognizer(mut self, recognizer: TextRecognizer<B>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Set configuration.
    pub fn with_config(mut self, config: OcrConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the OCR engine. A recognizer is required.
    pub fn build(self) -> Result<OcrEngine<B>, OcrError> {
        let recognizer = self
            .recognizer
            .ok_or_else(|| OcrError::ModelLoad("no text recognizer configured".to_string()))?;

        Ok(OcrEngine {
            detector: self.detector,
            classifier: self.classifier,
            recognizer,
            preprocessor: ImagePreprocessor::new(),
            config: self.config,
        })
    }
}

impl<B: InferenceBackend> Default for OcrEngineBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: InferenceBackend> OcrEngine<B> {
    /// Create a new builder.
    pub fn builder() -> OcrEngineBuilder<B> {
        OcrEngineBuilder::new()
    }

    /// Whether crops are split into lines before recognition.
    pub fn has_line_detection(&self) -> bool {
        self.detector.is_some() && self.config.enable_detection
    }

    fn line_polygons(&self, image: &DynamicImage) -> Result<Vec<[f32; 8]>, OcrError> {
        match &self.detector {
            Some(detector) if self.config.enable_detection => Ok(detector
                .detect(image)?
                .into_iter()
                .map(|line| line.polygon)
                .collect()),
            _ => {
                let (w, h) = image.dimensions();
                let (w, h) = (w as f32, h as f32);
                Ok(vec![[0.0, 0.0, w, 0.0, w, h, 0.0, h]])
            }
        }
    }
}

impl<B: InferenceBackend> TextRecognition for OcrEngine<B> {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("empty crop {width}x{height}")));
        }

        let polygons = self.line_polygons(image)?;
        trace!("Recognizing {} line(s) in {}x{} crop", polygons.len(), width, height);

        let mut lines = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            let mut line_image = self.preprocessor.crop_line(image, &polygon);

            if self.config.enable_classification {
                if let Some(classifier) = &self.classifier {
                    let (rotated, angle) = classifier.auto_rotate(line_image)?;
                    if angle != 0 {
                        trace!("Rotated line by {}°", angle);
                    }
                    line_image = rotated;
                }
            }

            let result = self.recognizer.recognize(&line_image)?;
            if result.text.is_empty() || result.confidence < self.config.recognition_threshold {
                continue;
            }

            lines.push(RecognizedLine {
                text: result.text,
                confidence: result.confidence,
                polygon,
            });
        }

        sort_lines(&mut lines);
        debug!("Recognized {} line(s)", lines.len());
        Ok(lines)
    }
}

/// Order lines top-to-bottom, then left-to-right within a row.
fn sort_lines(lines: &mut [RecognizedLine]) {
    lines.sort_by(|a, b| {
        a.top()
            .total_cmp(&b.top())
            .then_with(|| a.left().total_cmp(&b.left()))
    });

    // Neighbours on the same row go left to right even if slightly higher.
    for i in 1..lines.len() {
        let mut j = i;
        while j > 0
            && (lines[j].top() - lines[j - 1].top()).abs() < SAME_ROW_PX
            && lines[j].left().total_cmp(&lines[j - 1].left()) == Ordering::Less
        {
            lines.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Create an OCR engine with models from a directory.
///
/// The recognizer is required; line detection and angle classification are
/// used when enabled and their model files exist.
#[cfg(feature = "native")]
pub fn create_engine_from_dir(
    model_dir: &Path,
    models: &crate::models::config::ModelConfig,
    config: OcrConfig,
) -> Result<OcrEngine<crate::OrtBackend>, OcrError> {
    use crate::OrtBackend;
    use menucard_inference::OrtOptions;

    let options = OrtOptions {
        intra_threads: config.num_threads,
        ..OrtOptions::default()
    };
    let load = |file: &str, what: &str| {
        OrtBackend::from_file_with(model_dir.join(file), options)
            .map_err(|e| OcrError::ModelLoad(format!("failed to load {what}: {e}")))
    };

    let mut builder = OcrEngine::builder().with_config(config.clone());

    let det_path = model_dir.join(&models.detection_model);
    if config.enable_detection && det_path.exists() {
        let detector = TextDetector::new(load(&models.detection_model, "line detector")?)
            .with_threshold(config.detection_threshold)
            .with_box_threshold(config.box_threshold);
        builder = builder.with_detector(detector);
        debug!("Loaded line detector from {}", det_path.display());
    }

    let cls_path = model_dir.join(&models.classification_model);
    if config.enable_classification && cls_path.exists() {
        let classifier = AngleClassifier::new(load(&models.classification_model, "classifier")?);
        builder = builder.with_classifier(classifier);
        debug!("Loaded angle classifier from {}", cls_path.display());
    }

    let dict_path = model_dir.join(&models.dictionary);
    let dictionary = if dict_path.exists() {
        TextRecognizer::<OrtBackend>::load_dictionary(&dict_path)?
    } else {
        TextRecognizer::<OrtBackend>::default_latin_dictionary()
    };
    let recognizer = TextRecognizer::new(load(&models.recognition_model, "recognizer")?, dictionary);

    builder.with_recognizer(recognizer).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedBackend;
    use image::GrayImage;
    use ndarray::Array3;
    use pretty_assertions::assert_eq;

    fn recognizer_for(path: &[usize], dictionary: Vec<char>) -> TextRecognizer<FixedBackend> {
        let mut logits = Array3::<f32>::zeros((1, path.len(), dictionary.len()));
        for (t, &c) in path.iter().enumerate() {
            logits[[0, t, c]] = 10.0;
        }
        TextRecognizer::new(FixedBackend::new(logits.into_dyn()), dictionary)
    }

    fn line(text: &str, x: f32, y: f32) -> RecognizedLine {
        RecognizedLine {
            text: text.to_string(),
            confidence: 1.0,
            polygon: [x, y, x + 10.0, y, x + 10.0, y + 5.0, x, y + 5.0],
        }
    }

    #[test]
    fn test_whole_crop_without_detector() {
        let engine = OcrEngine::builder()
            .with_recognizer(recognizer_for(&[1, 0, 2], vec![' ', '9', '€']))
            .build()
            .unwrap();
        assert!(!engine.has_line_detection());

        let crop = DynamicImage::ImageLuma8(GrayImage::new(30, 12));
        let lines = engine.recognize(&crop).unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "9€");
        assert_eq!(lines[0].polygon, [0.0, 0.0, 30.0, 0.0, 30.0, 12.0, 0.0, 12.0]);
    }

    #[test]
    fn test_low_confidence_lines_are_dropped() {
        let config = OcrConfig {
            recognition_threshold: 0.5,
            ..OcrConfig::default()
        };
        // All-blank logits decode to nothing
        let engine = OcrEngine::builder()
            .with_recognizer(recognizer_for(&[0, 0], vec![' ', 'a']))
            .with_config(config)
            .build()
            .unwrap();

        let crop = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert!(engine.recognize(&crop).unwrap().is_empty());
    }

    #[test]
    fn test_build_requires_recognizer() {
        let result = OcrEngine::<FixedBackend>::builder().build();
        assert!(matches!(result, Err(OcrError::ModelLoad(_))));
    }

    #[test]
    fn test_sort_lines_rows_then_columns() {
        let mut lines = vec![
            line("bottom", 0.0, 40.0),
            line("right", 50.0, 2.0),
            line("left", 0.0, 6.0),
        ];
        sort_lines(&mut lines);
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["left", "right", "bottom"]);
    }
}
