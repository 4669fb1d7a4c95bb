//! The reader context: models loaded once and reused for every page.

use std::path::Path;
use std::time::Instant;

use ab_glyph::FontVec;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detection::{MenuDetector, load_font, save_annotated};
use crate::error::{MenuError, Result};
use crate::extraction::ExtractionPipeline;
use crate::menu::{BoxAssociator, filter_priced, sort_reading_order};
use crate::models::config::MenuConfig;
use crate::models::menu::{ExtractedRecord, OrderedMenu};
use crate::ocr::TextRecognition;

/// Outcome of reading one menu page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuReport {
    /// Extracted records in reading order.
    pub records: Vec<ExtractedRecord>,
    /// Boxes returned by the detector.
    pub detection_count: usize,
    /// Items with at least one associated component.
    pub item_count: usize,
    /// Items that kept a price and were extracted.
    pub priced_count: usize,
    pub processing_time_ms: u64,
}

/// Owns the detector, the recognizer and the configuration.
///
/// Construct once at startup and call [`process`](Self::process) per page.
/// Dropping the reader releases the model sessions.
pub struct MenuReader<D: MenuDetector, R: TextRecognition> {
    detector: D,
    recognizer: R,
    config: MenuConfig,
    font: Option<FontVec>,
}

struct Prepared {
    image: DynamicImage,
    menu: OrderedMenu,
    detection_count: usize,
    item_count: usize,
}

impl<D: MenuDetector, R: TextRecognition> MenuReader<D, R> {
    /// Create a reader from already loaded collaborators.
    pub fn new(detector: D, recognizer: R, config: MenuConfig) -> Self {
        let font = load_font(config.detection.font_path.as_deref());
        if font.is_none() {
            debug!("No label font found; annotated previews will have boxes only");
        }
        Self {
            detector,
            recognizer,
            config,
            font,
        }
    }

    pub fn config(&self) -> &MenuConfig {
        &self.config
    }

    /// Read a page and write the text report to `output_txt`.
    ///
    /// When `annotated_output` is set, a preview with every detected box is
    /// saved there as well.
    pub fn process(
        &self,
        image_path: &Path,
        annotated_output: Option<&Path>,
        output_txt: &Path,
    ) -> Result<MenuReport> {
        let start = Instant::now();
        let prepared = self.prepare(image_path, annotated_output)?;

        let records = self.pipeline().extract_image(&prepared.image, &prepared.menu, output_txt)?;
        Ok(Self::report(prepared, records, start))
    }

    /// Read a page without writing a text report.
    pub fn read(&self, image_path: &Path, annotated_output: Option<&Path>) -> Result<MenuReport> {
        let start = Instant::now();
        let prepared = self.prepare(image_path, annotated_output)?;

        let records = self.pipeline().extract_records(&prepared.image, &prepared.menu);
        Ok(Self::report(prepared, records, start))
    }

    /// Detect, associate, filter and order the items of a loaded page.
    pub fn layout(&self, image: &DynamicImage) -> Result<OrderedMenu> {
        let boxes = self.detector.detect(image)?;
        let groups = BoxAssociator::new(self.config.association.strategy).associate(&boxes);
        Ok(sort_reading_order(filter_priced(groups)))
    }

    fn pipeline(&self) -> ExtractionPipeline<'_, R> {
        ExtractionPipeline::new(&self.recognizer, self.config.extraction.clone())
    }

    fn prepare(&self, image_path: &Path, annotated_output: Option<&Path>) -> Result<Prepared> {
        info!("Reading menu {}", image_path.display());
        let image = image::open(image_path).map_err(|source| MenuError::ImageLoad {
            path: image_path.to_path_buf(),
            source,
        })?;

        let boxes = self.detector.detect(&image)?;
        debug!("Detector returned {} boxes", boxes.len());

        if let Some(path) = annotated_output {
            // The preview is a side channel; losing it does not stop extraction
            if let Err(e) = save_annotated(&image, &boxes, self.font.as_ref(), path) {
                warn!("Could not save annotated image {}: {}", path.display(), e);
            }
        }

        let groups = BoxAssociator::new(self.config.association.strategy).associate(&boxes);
        let item_count = groups.len();
        let menu = sort_reading_order(filter_priced(groups));
        debug!("{} of {} items have a price", menu.len(), item_count);

        Ok(Prepared {
            image,
            menu,
            detection_count: boxes.len(),
            item_count,
        })
    }

    fn report(prepared: Prepared, records: Vec<ExtractedRecord>, start: Instant) -> MenuReport {
        let report = MenuReport {
            priced_count: prepared.menu.len(),
            records,
            detection_count: prepared.detection_count,
            item_count: prepared.item_count,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Read {} priced items in {}ms",
            report.priced_count, report.processing_time_ms
        );
        report
    }
}

/// Reader backed by ONNX Runtime sessions.
#[cfg(feature = "native")]
pub type NativeReader =
    MenuReader<crate::detection::YoloDetector<crate::OrtBackend>, crate::ocr::OcrEngine<crate::OrtBackend>>;

/// Load every model from `model_dir` using the file names in `config.models`.
///
/// The menu detector and the text recognizer are required.
#[cfg(feature = "native")]
pub fn create_reader_from_dir(model_dir: &Path, config: MenuConfig) -> Result<NativeReader> {
    use crate::OrtBackend;
    use crate::detection::YoloDetector;
    use crate::error::DetectionError;
    use crate::ocr::create_engine_from_dir;
    use menucard_inference::OrtOptions;

    let menu_model = model_dir.join(&config.models.menu_model);
    if !menu_model.exists() {
        return Err(DetectionError::ModelLoad(format!(
            "menu model not found: {}",
            menu_model.display()
        ))
        .into());
    }

    let options = OrtOptions {
        intra_threads: config.ocr.num_threads,
        ..OrtOptions::default()
    };
    let backend = OrtBackend::from_file_with(&menu_model, options)
        .map_err(|e| DetectionError::ModelLoad(e.to_string()))?;
    let detector = YoloDetector::with_config(backend, config.detection.clone());
    info!("Loaded menu detector from {}", menu_model.display());

    let engine = create_engine_from_dir(model_dir, &config.models, config.ocr.clone())?;
    info!("Loaded text recognition models from {}", model_dir.display());

    Ok(MenuReader::new(detector, engine, config))
}
