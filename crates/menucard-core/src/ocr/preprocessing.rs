//! Tensor preparation for the PaddleOCR models.

use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use ndarray::Array4;
use tracing::trace;

use crate::error::OcrError;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const HALF: [f32; 3] = [0.5, 0.5, 0.5];

/// Image preprocessor for the line detector, angle classifier and recognizer.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Longest side fed to the line detector.
    det_max_side: u32,
    /// Recognizer input height.
    rec_height: u32,
    /// Recognizer maximum input width.
    rec_max_width: u32,
    /// Classifier input size (width, height).
    cls_size: (u32, u32),
}

impl ImagePreprocessor {
    /// Create a new preprocessor with PaddleOCR defaults.
    pub fn new() -> Self {
        Self {
            det_max_side: 960,
            rec_height: 48,
            rec_max_width: 320,
            cls_size: (192, 48),
        }
    }

    /// Set the longest side used for line detection.
    pub fn with_det_max_side(mut self, side: u32) -> Self {
        self.det_max_side = side.max(32);
        self
    }

    /// Prepare an image for the DB line detector.
    ///
    /// Returns the NCHW tensor and the (x, y) scale from source to tensor
    /// pixels. The tensor is zero-padded to multiples of 32.
    pub fn preprocess_for_detection(
        &self,
        image: &DynamicImage,
    ) -> Result<(Array4<f32>, f32, f32), OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("empty image {width}x{height}")));
        }

        let (new_width, new_height) = fit_within(width, height, self.det_max_side);
        let resized = image
            .resize_exact(new_width, new_height, FilterType::Triangle)
            .to_rgb8();

        let pad_width = new_width.div_ceil(32) * 32;
        let pad_height = new_height.div_ceil(32) * 32;
        let mut tensor = Array4::<f32>::zeros((1, 3, pad_height as usize, pad_width as usize));
        normalize_into(&mut tensor, &resized, IMAGENET_MEAN, IMAGENET_STD);

        trace!(
            "Line detection input {}x{} padded to {}x{}",
            new_width, new_height, pad_width, pad_height
        );

        Ok((
            tensor,
            new_width as f32 / width as f32,
            new_height as f32 / height as f32,
        ))
    }

    /// Prepare a single text line for the CTC recognizer.
    ///
    /// The line is scaled to the model height keeping its aspect ratio and
    /// right-padded to the maximum width.
    pub fn preprocess_for_recognition(&self, image: &DynamicImage) -> Result<Array4<f32>, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("empty line {width}x{height}")));
        }

        let aspect_ratio = width as f32 / height as f32;
        let target_width = ((self.rec_height as f32 * aspect_ratio).ceil() as u32)
            .clamp(1, self.rec_max_width);

        let resized = image
            .resize_exact(target_width, self.rec_height, FilterType::Triangle)
            .to_rgb8();

        let mut tensor = Array4::<f32>::zeros((
            1,
            3,
            self.rec_height as usize,
            self.rec_max_width as usize,
        ));
        normalize_into(&mut tensor, &resized, HALF, HALF);
        Ok(tensor)
    }

    /// Prepare a text line for the 0/180 degree classifier.
    pub fn preprocess_for_classification(
        &self,
        image: &DynamicImage,
    ) -> Result<Array4<f32>, OcrError> {
        let (width, height) = self.cls_size;
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidImage("empty line".to_string()));
        }

        let resized = image
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        normalize_into(&mut tensor, &resized, HALF, HALF);
        Ok(tensor)
    }

    /// Crop a detected line given as a quadrilateral, clipped to the image.
    pub fn crop_line(&self, image: &DynamicImage, polygon: &[f32; 8]) -> DynamicImage {
        let xs = [polygon[0], polygon[2], polygon[4], polygon[6]];
        let ys = [polygon[1], polygon[3], polygon[5], polygon[7]];

        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min).max(0.0) as u32;
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min).max(0.0) as u32;
        let max_x = xs.iter().copied().fold(0.0, f32::max).min(image.width() as f32) as u32;
        let max_y = ys.iter().copied().fold(0.0, f32::max).min(image.height() as f32) as u32;

        image.crop_imm(
            min_x,
            min_y,
            max_x.saturating_sub(min_x).max(1),
            max_y.saturating_sub(min_y).max(1),
        )
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale `(width, height)` down so the longer side is at most `max_side`.
fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_side {
        return (width, height);
    }
    let scale = max_side as f32 / longest as f32;
    (
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

/// Write `(pixel / 255 - mean) / std` into the top-left of an NCHW tensor.
fn normalize_into(tensor: &mut Array4<f32>, rgb: &RgbImage, mean: [f32; 3], std: [f32; 3]) {
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - mean[c]) / std[c];
        }
    }
}
