//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use image::DynamicImage;
use menucard_inference::{InferenceBackend, InferenceError, InputTensor, OutputTensor};
use ndarray::ArrayD;

use crate::detection::MenuDetector;
use crate::error::{DetectionError, OcrError};
use crate::models::menu::BoundingBox;
use crate::ocr::{RecognizedLine, TextRecognition};

/// Backend that ignores its input and returns one fixed tensor.
pub struct FixedBackend {
    output: ArrayD<f32>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl FixedBackend {
    pub fn new(output: ArrayD<f32>) -> Self {
        Self {
            output,
            input_names: vec!["x".to_string()],
            output_names: vec!["output".to_string()],
        }
    }
}

impl InferenceBackend for FixedBackend {
    fn run(
        &self,
        _inputs: &[(&str, InputTensor)],
    ) -> Result<Vec<(String, OutputTensor)>, InferenceError> {
        Ok(vec![(
            "output".to_string(),
            OutputTensor::Float32(self.output.clone()),
        )])
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

/// Detector returning a canned list of boxes.
pub struct StaticDetector(pub Vec<BoundingBox>);

impl MenuDetector for StaticDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<BoundingBox>, DetectionError> {
        Ok(self.0.clone())
    }
}

/// Canned recognizer reply.
pub enum Reply {
    Text(&'static str),
    Nothing,
    Fail,
}

/// Recognizer answering calls from a queue, recording crop sizes.
///
/// An exhausted queue answers with no lines.
#[derive(Default)]
pub struct ScriptedRecognizer {
    replies: Mutex<VecDeque<Reply>>,
    pub crops: Mutex<Vec<(u32, u32, bool)>>,
}

impl ScriptedRecognizer {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            crops: Mutex::new(Vec::new()),
        }
    }

    /// Number of recognize calls made so far.
    pub fn calls(&self) -> usize {
        self.crops.lock().unwrap().len()
    }
}

impl TextRecognition for ScriptedRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, OcrError> {
        let is_gray = matches!(image, DynamicImage::ImageLuma8(_));
        self.crops
            .lock()
            .unwrap()
            .push((image.width(), image.height(), is_gray));

        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(vec![RecognizedLine {
                text: text.to_string(),
                confidence: 0.9,
                polygon: [0.0; 8],
            }]),
            Some(Reply::Nothing) | None => Ok(Vec::new()),
            Some(Reply::Fail) => Err(OcrError::Recognition("engine crashed".to_string())),
        }
    }
}
