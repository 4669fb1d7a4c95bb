//! Error types for the menucard-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the menucard library.
#[derive(Error, Debug)]
pub enum MenuError {
    /// The source page could not be read or decoded. Nothing is processed.
    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The text report could not be persisted.
    #[error("failed to write output {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Menu component detection error.
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    /// Text recognition error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Inference error from the inference layer.
    #[error("inference error: {0}")]
    Inference(#[from] menucard_inference::InferenceError),

    /// Image encoding error (annotated preview).
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the menu component detector.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// Failed to load the detection model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The model failed to run.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The model produced a tensor this decoder does not understand.
    #[error("unexpected model output: {0}")]
    InvalidOutput(String),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text line detection failed.
    #[error("text detection failed: {0}")]
    Detection(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Result type for the menucard library.
pub type Result<T> = std::result::Result<T, MenuError>;
