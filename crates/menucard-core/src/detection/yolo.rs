//! YOLOv8 menu component detector.

use image::{DynamicImage, GenericImageView, imageops::FilterType};
use ndarray::{Array4, ArrayViewD};
use tracing::{debug, warn};

use crate::error::DetectionError;
use crate::models::config::DetectionConfig;
use crate::models::menu::BoundingBox;
use menucard_inference::{InferenceBackend, InputTensor};

use super::MenuDetector;

/// Detector for a YOLOv8 export with head shape `(1, 4 + classes, anchors)`.
pub struct YoloDetector<B: InferenceBackend> {
    backend: B,
    config: DetectionConfig,
}

impl<B: InferenceBackend> YoloDetector<B> {
    /// Create a detector with default thresholds.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, DetectionConfig::default())
    }

    /// Create a detector with explicit thresholds and input size.
    pub fn with_config(backend: B, config: DetectionConfig) -> Self {
        Self { backend, config }
    }

    /// Detect components and return raw `[x1, y1, x2, y2, confidence, class_id]` tuples.
    pub fn detect_raw(&self, image: &DynamicImage) -> Result<Vec<[f32; 6]>, DetectionError> {
        let (orig_width, orig_height) = image.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return Ok(Vec::new());
        }

        let tensor = self.preprocess(image);
        let input_name = self.backend.primary_input("images");
        let outputs = self
            .backend
            .run(&[(input_name, InputTensor::Float32(tensor.into_dyn()))])
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let head = outputs
            .into_iter()
            .next()
            .ok_or_else(|| DetectionError::InvalidOutput("no output from model".to_string()))?
            .1
            .into_f32("detection head")
            .map_err(|e| DetectionError::InvalidOutput(e.to_string()))?;

        let size = self.config.input_size as f32;
        let scale = (orig_width as f32 / size, orig_height as f32 / size);
        let candidates = self.decode(head.view(), scale, (orig_width, orig_height))?;
        let kept = self.nms(candidates);

        debug!("Detected {} menu components", kept.len());
        Ok(kept)
    }

    fn preprocess(&self, image: &DynamicImage) -> Array4<f32> {
        let size = self.config.input_size.max(1);
        let rgb = image
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8();

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }
        tensor
    }

    fn decode(
        &self,
        head: ArrayViewD<'_, f32>,
        (scale_x, scale_y): (f32, f32),
        (orig_width, orig_height): (u32, u32),
    ) -> Result<Vec<[f32; 6]>, DetectionError> {
        let shape = head.shape();
        let features = 4 + self.config.num_classes;

        // Some exports transpose the head to (1, anchors, 4 + classes)
        let features_first = match shape {
            [1, f, _] if *f == features => true,
            [1, _, f] if *f == features => false,
            _ => {
                return Err(DetectionError::InvalidOutput(format!(
                    "expected (1, {features}, anchors), got {shape:?}"
                )));
            }
        };
        let anchors = if features_first { shape[2] } else { shape[1] };
        let at = |f: usize, a: usize| {
            if features_first {
                head[[0, f, a]]
            } else {
                head[[0, a, f]]
            }
        };

        let (max_x, max_y) = (orig_width as f32, orig_height as f32);
        let mut candidates = Vec::new();

        for a in 0..anchors {
            let (class_id, score) = (4..features)
                .map(|f| (f - 4, at(f, a)))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 { cur } else { best }
                });

            if score < self.config.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (at(0, a), at(1, a), at(2, a), at(3, a));
            candidates.push([
                ((cx - w / 2.0) * scale_x).clamp(0.0, max_x),
                ((cy - h / 2.0) * scale_y).clamp(0.0, max_y),
                ((cx + w / 2.0) * scale_x).clamp(0.0, max_x),
                ((cy + h / 2.0) * scale_y).clamp(0.0, max_y),
                score,
                class_id as f32,
            ]);
        }

        Ok(candidates)
    }

    /// Per-class greedy suppression, highest confidence first.
    fn nms(&self, mut candidates: Vec<[f32; 6]>) -> Vec<[f32; 6]> {
        candidates.sort_by(|a, b| b[4].total_cmp(&a[4]));

        let mut keep: Vec<[f32; 6]> = Vec::new();
        for candidate in candidates {
            if keep.len() >= self.config.max_detections {
                break;
            }
            let suppressed = keep.iter().any(|kept| {
                kept[5] == candidate[5] && raw_iou(kept, &candidate) > self.config.nms_threshold
            });
            if !suppressed {
                keep.push(candidate);
            }
        }
        keep
    }
}

fn raw_iou(a: &[f32; 6], b: &[f32; 6]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

impl<B: InferenceBackend> MenuDetector for YoloDetector<B> {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<BoundingBox>, DetectionError> {
        let boxes = self
            .detect_raw(image)?
            .into_iter()
            .filter_map(|raw| {
                let bbox = BoundingBox::from_raw(raw);
                if bbox.is_none() {
                    warn!("Skipping box with unknown class id {}", raw[5]);
                }
                bbox
            })
            .collect();
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::menu::ComponentRole;
    use crate::testing::FixedBackend;
    use image::RgbImage;
    use ndarray::Array3;
    use pretty_assertions::assert_eq;

    /// Head with 4 classes and the given anchors `(cx, cy, w, h, class, score)`.
    fn head(anchors: &[(f32, f32, f32, f32, usize, f32)]) -> FixedBackend {
        let mut out = Array3::<f32>::zeros((1, 8, anchors.len()));
        for (a, &(cx, cy, w, h, class, score)) in anchors.iter().enumerate() {
            out[[0, 0, a]] = cx;
            out[[0, 1, a]] = cy;
            out[[0, 2, a]] = w;
            out[[0, 3, a]] = h;
            out[[0, 4 + class, a]] = score;
        }
        FixedBackend::new(out.into_dyn())
    }

    fn page(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn test_decode_rescales_and_suppresses() {
        let backend = head(&[
            (320.0, 320.0, 100.0, 100.0, 1, 0.9),
            (322.0, 320.0, 100.0, 100.0, 1, 0.8), // duplicate item
            (100.0, 100.0, 20.0, 10.0, 2, 0.1),   // below threshold
            (322.0, 320.0, 100.0, 100.0, 3, 0.6), // same place, other class
        ]);
        let detector = YoloDetector::new(backend);

        let raw = detector.detect_raw(&page(1280, 640)).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0], [540.0, 270.0, 740.0, 370.0, 0.9, 1.0]);
        assert_eq!(raw[1][5], 3.0);

        let boxes = detector.detect(&page(1280, 640)).unwrap();
        assert_eq!(boxes[0].role, ComponentRole::Item);
        assert_eq!(boxes[1].role, ComponentRole::Title);
    }

    #[test]
    fn test_boxes_are_clamped_to_page() {
        let detector = YoloDetector::new(head(&[(10.0, 630.0, 40.0, 40.0, 0, 0.5)]));
        let raw = detector.detect_raw(&page(640, 640)).unwrap();
        assert_eq!(raw[0][..4], [0.0, 610.0, 30.0, 640.0]);
    }

    #[test]
    fn test_max_detections_caps_output() {
        let config = DetectionConfig {
            max_detections: 1,
            ..DetectionConfig::default()
        };
        let backend = head(&[
            (100.0, 100.0, 20.0, 20.0, 0, 0.5),
            (400.0, 400.0, 20.0, 20.0, 0, 0.7),
        ]);
        let raw = YoloDetector::with_config(backend, config)
            .detect_raw(&page(640, 640))
            .unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0][4], 0.7);
    }

    #[test]
    fn test_narrow_heads_decode() {
        let single = YoloDetector::new(head(&[(320.0, 320.0, 64.0, 32.0, 2, 0.8)]));
        let raw = single.detect_raw(&page(640, 640)).unwrap();
        assert_eq!(raw, vec![[288.0, 304.0, 352.0, 336.0, 0.8, 2.0]]);

        let three = YoloDetector::new(head(&[
            (100.0, 100.0, 20.0, 20.0, 0, 0.5),
            (300.0, 300.0, 20.0, 20.0, 1, 0.6),
            (500.0, 500.0, 20.0, 20.0, 3, 0.7),
        ]));
        let raw = three.detect_raw(&page(640, 640)).unwrap();
        let classes: Vec<f32> = raw.iter().map(|r| r[5]).collect();
        assert_eq!(classes, vec![3.0, 1.0, 0.0]);
    }

    #[test]
    fn test_transposed_head_decodes() {
        let mut out = Array3::<f32>::zeros((1, 2, 8));
        out[[0, 0, 0]] = 320.0;
        out[[0, 0, 1]] = 320.0;
        out[[0, 0, 2]] = 64.0;
        out[[0, 0, 3]] = 32.0;
        out[[0, 0, 5]] = 0.9;
        let raw = YoloDetector::new(FixedBackend::new(out.into_dyn()))
            .detect_raw(&page(640, 640))
            .unwrap();
        assert_eq!(raw, vec![[288.0, 304.0, 352.0, 336.0, 0.9, 1.0]]);
    }

    #[test]
    fn test_head_with_wrong_class_count() {
        let backend = FixedBackend::new(ndarray::ArrayD::zeros(ndarray::IxDyn(&[1, 6, 3])));
        let result = YoloDetector::new(backend).detect_raw(&page(64, 64));
        assert!(matches!(result, Err(DetectionError::InvalidOutput(_))));
    }

    #[test]
    fn test_bad_head_shape() {
        let backend = FixedBackend::new(ndarray::ArrayD::zeros(ndarray::IxDyn(&[1, 3])));
        let result = YoloDetector::new(backend).detect_raw(&page(64, 64));
        assert!(matches!(result, Err(DetectionError::InvalidOutput(_))));
    }
}
