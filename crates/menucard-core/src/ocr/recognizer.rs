//! Text recognition using the PaddleOCR CTC recognition model.

use std::path::Path;

use image::DynamicImage;
use ndarray::ArrayViewD;
use tracing::{debug, trace};

use crate::error::OcrError;
use menucard_inference::{InferenceBackend, InputTensor};

use super::preprocessing::ImagePreprocessor;

/// Text recognizer using a CRNN/SVTR model with CTC output.
pub struct TextRecognizer<B: InferenceBackend> {
    backend: B,
    preprocessor: ImagePreprocessor,
    dictionary: Vec<char>,
}

/// Recognition result for a single text line.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Recognized text.
    pub text: String,
    /// Mean per-character confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl<B: InferenceBackend> TextRecognizer<B> {
    /// Create a new text recognizer. Index 0 of `dictionary` is the CTC blank.
    pub fn new(backend: B, dictionary: Vec<char>) -> Self {
        Self {
            backend,
            preprocessor: ImagePreprocessor::new(),
            dictionary,
        }
    }

    /// Load a dictionary file with one character per line.
    ///
    /// A blank token is prepended and a trailing space appended, matching
    /// PaddleOCR's `use_space_char` exports.
    pub fn load_dictionary(path: &Path) -> Result<Vec<char>, OcrError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OcrError::ModelLoad(format!("failed to load dictionary: {e}")))?;

        let mut chars = vec![' '];
        chars.extend(content.lines().filter_map(|line| line.chars().next()));
        chars.push(' ');

        debug!("Loaded dictionary with {} characters", chars.len());
        Ok(chars)
    }

    /// Built-in Latin dictionary covering Spanish menus.
    pub fn default_latin_dictionary() -> Vec<char> {
        let mut chars = vec![' ']; // CTC blank

        chars.extend('0'..='9');
        chars.extend('A'..='Z');
        chars.extend('a'..='z');

        // Spanish letters and marks
        chars.extend([
            'Á', 'á', 'É', 'é', 'Í', 'í', 'Ó', 'ó', 'Ú', 'ú', 'Ü', 'ü', 'Ñ', 'ñ', 'Ç', 'ç', '¿',
            '¡', 'ª', 'º',
        ]);

        chars.extend([
            '.', ',', ';', ':', '!', '?', '-', '_', '/', '\\', '(', ')', '[', ']', '<', '>', '@',
            '#', '$', '%', '&', '*', '+', '=', '\'', '"',
        ]);

        chars.extend(['€', '£', '°', '½', '·']);
        chars.push(' ');

        chars
    }

    /// Recognize the text of a single line image.
    pub fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult, OcrError> {
        let tensor = self.preprocessor.preprocess_for_recognition(image)?;

        let input_name = self.backend.primary_input("x");
        let outputs = self
            .backend
            .run(&[(input_name, InputTensor::Float32(tensor.into_dyn()))])
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        let logits = outputs
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Recognition("no output from model".to_string()))?
            .1
            .into_f32("character logits")
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        self.decode(logits.view())
    }

    /// Greedy CTC decoding: argmax per step, collapse repeats, drop blanks.
    fn decode(&self, output: ArrayViewD<'_, f32>) -> Result<RecognitionResult, OcrError> {
        // [1, T, classes]
        let shape = output.shape();
        if shape.len() != 3 {
            return Err(OcrError::Recognition(format!("invalid output shape: {shape:?}")));
        }
        let (seq_len, num_classes) = (shape[1], shape[2]);

        let mut text = String::new();
        let mut scores = Vec::new();
        let mut prev_idx = 0usize;

        for t in 0..seq_len {
            let mut max_idx = 0;
            let mut max_val = f32::NEG_INFINITY;
            for c in 0..num_classes {
                let val = output[[0, t, c]];
                if val > max_val {
                    max_val = val;
                    max_idx = c;
                }
            }

            if max_idx != 0 && max_idx != prev_idx {
                if let Some(&ch) = self.dictionary.get(max_idx) {
                    // Softmax probability of the winning class
                    let sum_exp: f32 = (0..num_classes)
                        .map(|c| (output[[0, t, c]] - max_val).exp())
                        .sum();
                    text.push(ch);
                    scores.push(1.0 / sum_exp);
                }
            }
            prev_idx = max_idx;
        }

        let confidence = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };

        let text = text.trim().to_string();
        trace!("Recognized: '{}' (confidence: {:.3})", text, confidence);

        Ok(RecognitionResult { text, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedBackend;
    use image::GrayImage;
    use ndarray::{Array3, ArrayD};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_dictionary() {
        let dict = TextRecognizer::<FixedBackend>::default_latin_dictionary();
        for c in ['ñ', 'á', 'é', '¿', '€', '0', '9', ',', '.'] {
            assert!(dict.contains(&c), "missing {c}");
        }
        assert_eq!(dict[0], ' ');
    }

    #[test]
    fn test_load_dictionary_adds_blank_and_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.txt");
        std::fs::write(&path, "a\nb\n€\n").unwrap();

        let dict = TextRecognizer::<FixedBackend>::load_dictionary(&path).unwrap();
        assert_eq!(dict, vec![' ', 'a', 'b', '€', ' ']);
    }

    #[test]
    fn test_ctc_decoding() {
        // Dictionary: blank, '1', '2', ',', '5', '€'
        let dictionary = vec![' ', '1', '2', ',', '5', '€'];
        // Steps: 1 1 _ 2 , , 5 _ 5 €  ->  "12,55€"
        let path = [1, 1, 0, 2, 3, 3, 4, 0, 4, 5];
        let mut logits = Array3::<f32>::zeros((1, path.len(), dictionary.len()));
        for (t, &c) in path.iter().enumerate() {
            logits[[0, t, c]] = 10.0;
        }

        let recognizer = TextRecognizer::new(FixedBackend::new(logits.into_dyn()), dictionary);
        let line = DynamicImage::ImageLuma8(GrayImage::new(60, 20));
        let result = recognizer.recognize(&line).unwrap();

        assert_eq!(result.text, "12,55€");
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_all_blank_is_empty() {
        let logits = ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 4, 3]));
        let recognizer = TextRecognizer::new(FixedBackend::new(logits), vec![' ', 'a', 'b']);
        let line = DynamicImage::ImageLuma8(GrayImage::new(20, 10));
        let result = recognizer.recognize(&line).unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
    }
}
