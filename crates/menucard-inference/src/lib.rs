//! ONNX inference layer for menucard.
//!
//! Both the menu component detector and the text recognition models run
//! through the [`InferenceBackend`] trait, so the pipeline code never talks
//! to ONNX Runtime directly and tests can substitute canned tensors.

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor, TensorType};

#[cfg(feature = "native")]
pub use backend::ort::{OrtBackend, OrtOptions};

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
