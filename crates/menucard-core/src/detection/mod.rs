//! Menu component detection and annotated previews.

mod annotate;
mod yolo;

pub use annotate::{draw_annotations, load_font, save_annotated};
pub use yolo::YoloDetector;

use image::DynamicImage;

use crate::error::DetectionError;
use crate::models::menu::BoundingBox;

/// Finds item, title, description and price boxes on a menu page.
pub trait MenuDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<BoundingBox>, DetectionError>;
}
