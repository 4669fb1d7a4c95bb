//! Text line orientation (0 or 180 degrees).

use image::DynamicImage;
use tracing::trace;

use crate::error::OcrError;
use menucard_inference::{InferenceBackend, InputTensor};

use super::preprocessing::ImagePreprocessor;

/// Angle classifier for upside-down text lines.
pub struct AngleClassifier<B: InferenceBackend> {
    backend: B,
    preprocessor: ImagePreprocessor,
    threshold: f32,
}

impl<B: InferenceBackend> AngleClassifier<B> {
    /// Create a new angle classifier.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            preprocessor: ImagePreprocessor::new(),
            threshold: 0.9,
        }
    }

    /// Confidence required before a line is flipped.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Classify the angle of a text line.
    ///
    /// Returns (angle, confidence) where angle is 0 or 180.
    pub fn classify(&self, image: &DynamicImage) -> Result<(i32, f32), OcrError> {
        let tensor = self.preprocessor.preprocess_for_classification(image)?;

        let input_name = self.backend.primary_input("x");
        let outputs = self
            .backend
            .run(&[(input_name, InputTensor::Float32(tensor.into_dyn()))])
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        let probs = outputs
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Recognition("no output from classifier".to_string()))?
            .1
            .into_f32("angle probabilities")
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        // [1, 2]: probabilities for 0 and 180 degrees
        let probs: Vec<f32> = probs.iter().copied().collect();
        let (angle, confidence) = match probs.as_slice() {
            [up, down, ..] if down > up => (180, *down),
            [up, ..] => (0, *up),
            [] => (0, 1.0),
        };

        trace!("Classified angle: {}° (confidence: {:.3})", angle, confidence);
        Ok((angle, confidence))
    }

    /// Rotate the line when it is confidently upside down.
    ///
    /// Returns the (possibly rotated) line and the applied angle.
    pub fn auto_rotate(&self, image: DynamicImage) -> Result<(DynamicImage, i32), OcrError> {
        let (angle, confidence) = self.classify(&image)?;
        if angle == 180 && confidence > self.threshold {
            Ok((image.rotate180(), 180))
        } else {
            Ok((image, 0))
        }
    }
}
