//! Error types for the inference layer.

use thiserror::Error;

/// Errors raised while loading or running an ONNX model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model file could not be parsed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The runtime refused to build a session.
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// Input tensor has the wrong shape or element type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session failed while running.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// An output tensor could not be converted back to an array.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    /// I/O error when reading model files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
