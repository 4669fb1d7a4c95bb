//! Per-item text extraction and report writing.

mod crop;
mod writer;

pub use crop::{TITLE_MARGIN_PX, UPSCALE_FACTOR, crop_component, enhance_resolution, margin_for};
pub use writer::ReportWriter;

use std::path::Path;
use std::time::Duration;

use image::DynamicImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{MenuError, Result};
use crate::models::config::ExtractionConfig;
use crate::models::menu::{ComponentRole, ExtractedRecord, ItemGroup, OrderedMenu};
use crate::ocr::TextRecognition;

/// Reads the title, description and price of every ordered item.
pub struct ExtractionPipeline<'a, R: TextRecognition> {
    recognizer: &'a R,
    config: ExtractionConfig,
}

impl<'a, R: TextRecognition> ExtractionPipeline<'a, R> {
    /// Create a pipeline borrowing a shared recognizer.
    pub fn new(recognizer: &'a R, config: ExtractionConfig) -> Self {
        Self { recognizer, config }
    }

    /// Load the page, extract every item and write the report to `output_path`.
    ///
    /// Fails before creating any output when the page cannot be loaded.
    /// Recognition problems only blank the affected field.
    pub fn extract(
        &self,
        image_path: &Path,
        menu: &OrderedMenu,
        output_path: &Path,
    ) -> Result<Vec<ExtractedRecord>> {
        let image = image::open(image_path).map_err(|source| MenuError::ImageLoad {
            path: image_path.to_path_buf(),
            source,
        })?;
        self.extract_image(&image, menu, output_path)
    }

    /// Extract from a loaded page and write the report to `output_path`.
    pub fn extract_image(
        &self,
        image: &DynamicImage,
        menu: &OrderedMenu,
        output_path: &Path,
    ) -> Result<Vec<ExtractedRecord>> {
        let mut writer = ReportWriter::create(output_path)?;

        let records = if self.config.parallel {
            let records = self.extract_records(image, menu);
            for record in &records {
                writer.append(record)?;
            }
            records
        } else {
            let mut records = Vec::with_capacity(menu.len());
            for (index, group) in menu.iter_indexed() {
                let record = self.extract_item(image, index, group);
                writer.append(&record)?;
                records.push(record);
            }
            records
        };

        let path = writer.commit()?;
        info!("Extraction complete. Results saved to {}", path.display());
        Ok(records)
    }

    /// Extract records for an already loaded page, in menu order.
    pub fn extract_records(&self, image: &DynamicImage, menu: &OrderedMenu) -> Vec<ExtractedRecord> {
        if self.config.parallel {
            menu.items()
                .par_iter()
                .enumerate()
                .map(|(i, group)| self.extract_item(image, i + 1, group))
                .collect()
        } else {
            menu.iter_indexed()
                .map(|(index, group)| self.extract_item(image, index, group))
                .collect()
        }
    }

    fn extract_item(&self, image: &DynamicImage, index: usize, group: &ItemGroup) -> ExtractedRecord {
        let record = ExtractedRecord {
            index,
            title: self.read_component(image, index, group, ComponentRole::Title),
            description: self.read_component(image, index, group, ComponentRole::Description),
            price: self.read_component(image, index, group, ComponentRole::Price),
        };
        info!("Extracted text for item {}", record);
        record
    }

    fn read_component(
        &self,
        image: &DynamicImage,
        index: usize,
        group: &ItemGroup,
        role: ComponentRole,
    ) -> String {
        let Some(bbox) = group.component(role) else {
            return String::new();
        };

        let Some(crop) = crop_component(image, bbox, margin_for(role)) else {
            debug!("Item {}: {} box lies outside the page", index, role);
            return String::new();
        };

        self.recognize_with_retry(&enhance_resolution(&crop), index, role)
    }

    /// First recognized line, retrying failed calls with doubling backoff.
    fn recognize_with_retry(&self, crop: &DynamicImage, index: usize, role: ComponentRole) -> String {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.recognizer.recognize(crop) {
                Ok(lines) => {
                    return match lines.into_iter().next() {
                        Some(line) => line.text,
                        None => {
                            debug!("Item {}: no text recognized for {}", index, role);
                            String::new()
                        }
                    };
                }
                Err(e) => {
                    warn!(
                        "Item {}: {} recognition failed (attempt {}/{}): {}",
                        index, role, attempt, attempts, e
                    );
                    if attempt < attempts {
                        let delay = self.config.retry_backoff_ms.saturating_mul(1 << (attempt - 1).min(16));
                        std::thread::sleep(Duration::from_millis(delay));
                    }
                }
            }
        }

        String::new()
    }
}
