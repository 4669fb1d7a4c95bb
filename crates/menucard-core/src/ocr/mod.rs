//! Text recognition over component crops using PaddleOCR models.

mod classifier;
mod detector;
mod engine;
mod preprocessing;
mod recognizer;

pub use classifier::AngleClassifier;
pub use detector::{DetectedLine, TextDetector};
pub use engine::{OcrEngine, OcrEngineBuilder};
#[cfg(feature = "native")]
pub use engine::create_engine_from_dir;
pub use preprocessing::ImagePreprocessor;
pub use recognizer::{RecognitionResult, TextRecognizer};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// One recognized text line, ranked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    /// Recognized text.
    pub text: String,
    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Line quadrilateral in crop coordinates: TL, TR, BR, BL.
    pub polygon: [f32; 8],
}

impl RecognizedLine {
    /// Top edge of the line.
    pub fn top(&self) -> f32 {
        self.polygon[1].min(self.polygon[3])
    }

    /// Left edge of the line.
    pub fn left(&self) -> f32 {
        self.polygon[0].min(self.polygon[6])
    }
}

/// Turns an image crop into ranked text lines.
///
/// An empty vector means nothing legible was found; callers treat it the
/// same as a missing component.
pub trait TextRecognition: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, OcrError>;
}
