//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// A loaded model that maps named input tensors to named output tensors.
///
/// Implementations must be shareable across threads: the menu reader keeps
/// one backend per model for the whole process and may recognise several
/// crops concurrently.
pub trait InferenceBackend: Send + Sync {
    /// Run the model once.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Input names declared by the model.
    fn input_names(&self) -> &[String];

    /// Output names declared by the model.
    fn output_names(&self) -> &[String];

    /// Name of the first declared input, falling back to `default`.
    ///
    /// PaddleOCR exports call their image input `x`, Ultralytics exports
    /// call it `images`; callers pass the convention they expect.
    fn primary_input<'a>(&'a self, default: &'a str) -> &'a str {
        self.input_names()
            .first()
            .map(String::as_str)
            .unwrap_or(default)
    }
}
