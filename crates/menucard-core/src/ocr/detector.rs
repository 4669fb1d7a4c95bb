//! Text line detection with the PaddleOCR DB model.

use image::{DynamicImage, GenericImageView};
use ndarray::ArrayViewD;
use tracing::debug;

use crate::error::OcrError;
use menucard_inference::{InferenceBackend, InputTensor};

use super::preprocessing::ImagePreprocessor;

/// Components smaller than this many pixels are noise.
const MIN_COMPONENT_PIXELS: usize = 10;

/// A detected text line in source image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLine {
    /// Quadrilateral `(x1, y1, ..., x4, y4)`: TL, TR, BR, BL.
    pub polygon: [f32; 8],
    /// Mean probability inside the line.
    pub score: f32,
}

/// Line detector using a differentiable-binarisation probability map.
pub struct TextDetector<B: InferenceBackend> {
    backend: B,
    preprocessor: ImagePreprocessor,
    threshold: f32,
    box_threshold: f32,
    unclip_ratio: f32,
}

impl<B: InferenceBackend> TextDetector<B> {
    /// Create a new text detector with the given backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            preprocessor: ImagePreprocessor::new(),
            threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
        }
    }

    /// Pixel probability threshold for the binary map.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Minimum mean probability of a kept line.
    pub fn with_box_threshold(mut self, threshold: f32) -> Self {
        self.box_threshold = threshold;
        self
    }

    /// Detect text lines in an image (usually one component crop).
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedLine>, OcrError> {
        let (tensor, scale_x, scale_y) = self.preprocessor.preprocess_for_detection(image)?;

        let input_name = self.backend.primary_input("x");
        let outputs = self
            .backend
            .run(&[(input_name, InputTensor::Float32(tensor.into_dyn()))])
            .map_err(|e| OcrError::Detection(e.to_string()))?;

        let map = outputs
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Detection("no output from model".to_string()))?
            .1
            .into_f32("probability map")
            .map_err(|e| OcrError::Detection(e.to_string()))?;

        let lines = self.post_process(map.view(), scale_x, scale_y, image.dimensions())?;
        debug!("Detected {} text lines", lines.len());
        Ok(lines)
    }

    fn post_process(
        &self,
        map: ArrayViewD<'_, f32>,
        scale_x: f32,
        scale_y: f32,
        (orig_width, orig_height): (u32, u32),
    ) -> Result<Vec<DetectedLine>, OcrError> {
        // [1, 1, H, W]
        let shape = map.shape();
        if shape.len() != 4 {
            return Err(OcrError::Detection(format!("invalid output shape: {shape:?}")));
        }
        let (height, width) = (shape[2], shape[3]);

        let prob = |x: usize, y: usize| map[[0, 0, y, x]];
        let mut visited = vec![false; width * height];
        let mut lines = Vec::new();

        for y in 0..height {
            for x in 0..width {
                if visited[y * width + x] || prob(x, y) <= self.threshold {
                    continue;
                }

                // 4-connected flood fill collecting extent and score
                let mut stack = vec![(x, y)];
                visited[y * width + x] = true;
                let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
                let mut pixels = 0usize;
                let mut score_sum = 0.0f32;

                while let Some((cx, cy)) = stack.pop() {
                    pixels += 1;
                    score_sum += prob(cx, cy);
                    min_x = min_x.min(cx);
                    max_x = max_x.max(cx);
                    min_y = min_y.min(cy);
                    max_y = max_y.max(cy);

                    let neighbours = [
                        (cx.wrapping_sub(1), cy),
                        (cx + 1, cy),
                        (cx, cy.wrapping_sub(1)),
                        (cx, cy + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx < width
                            && ny < height
                            && !visited[ny * width + nx]
                            && prob(nx, ny) > self.threshold
                        {
                            visited[ny * width + nx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }

                if pixels < MIN_COMPONENT_PIXELS {
                    continue;
                }
                let score = score_sum / pixels as f32;
                if score < self.box_threshold {
                    continue;
                }

                // DB maps shrink text regions; expand back by the unclip ratio
                let w = (max_x - min_x) as f32;
                let h = (max_y - min_y) as f32;
                let expand_x = w * (self.unclip_ratio - 1.0) / 2.0;
                let expand_y = h * (self.unclip_ratio - 1.0) / 2.0;

                let x1 = ((min_x as f32 - expand_x) / scale_x).clamp(0.0, orig_width as f32);
                let y1 = ((min_y as f32 - expand_y) / scale_y).clamp(0.0, orig_height as f32);
                let x2 = ((max_x as f32 + expand_x) / scale_x).clamp(0.0, orig_width as f32);
                let y2 = ((max_y as f32 + expand_y) / scale_y).clamp(0.0, orig_height as f32);

                lines.push(DetectedLine {
                    polygon: [x1, y1, x2, y1, x2, y2, x1, y2],
                    score,
                });
            }
        }

        Ok(lines)
    }
}
