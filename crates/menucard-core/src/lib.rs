//! Core library for reading photographed menu cards.
//!
//! This crate provides:
//! - Menu component detection (YOLOv8 over ONNX) with annotated previews
//! - Association of title/description/price boxes with their item box
//! - Price filtering and left-to-right, top-to-bottom reading order
//! - Per-component text extraction using PaddleOCR models
//! - A [`MenuReader`] context that owns the models for the process lifetime

pub mod detection;
pub mod error;
pub mod extraction;
pub mod menu;
pub mod models;
pub mod ocr;
pub mod reader;

#[cfg(test)]
mod testing;

pub use detection::{MenuDetector, YoloDetector, draw_annotations, save_annotated};
pub use error::{DetectionError, MenuError, OcrError, Result};
pub use extraction::{ExtractionPipeline, ReportWriter, crop_component, enhance_resolution};
pub use menu::{AssociationStrategy, BoxAssociator, filter_priced, sort_reading_order};
pub use models::config::MenuConfig;
pub use models::menu::{BoundingBox, ComponentRole, ExtractedRecord, ItemGroup, OrderedMenu};
pub use ocr::{OcrEngine, RecognizedLine, TextRecognition};
pub use reader::{MenuReader, MenuReport};
#[cfg(feature = "native")]
pub use reader::{NativeReader, create_reader_from_dir};

/// Re-export inference types.
pub use menucard_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use menucard_inference::OrtBackend;
