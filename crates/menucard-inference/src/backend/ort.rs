//! ONNX Runtime (ort) backend with the XNNPACK execution provider.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::ep::XNNPACK;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use tracing::debug;

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

/// Session options applied when a model is loaded.
#[derive(Debug, Clone, Copy)]
pub struct OrtOptions {
    /// Intra-op thread count.
    pub intra_threads: usize,
    /// Register the XNNPACK execution provider.
    pub xnnpack: bool,
}

impl Default for OrtOptions {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            xnnpack: true,
        }
    }
}

/// Backend using ONNX Runtime for native inference.
///
/// `Session::run` needs `&mut`, so the session sits behind a mutex; the
/// reader shares one backend per model across the whole process.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OrtBackend {
    /// Load a model from a file path with default options.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with(path, OrtOptions::default())
    }

    /// Load a model from a file path.
    pub fn from_file_with<P: AsRef<Path>>(path: P, options: OrtOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading ONNX model from: {}", path.display());

        let bytes = std::fs::read(path)?;
        Self::from_bytes_with(&bytes, options)
    }

    /// Load a model from bytes.
    pub fn from_bytes_with(bytes: &[u8], options: OrtOptions) -> Result<Self> {
        debug!(
            "Creating ONNX session from {} bytes ({} threads, xnnpack: {})",
            bytes.len(),
            options.intra_threads,
            options.xnnpack
        );

        let session_err = |e: ort::Error| InferenceError::SessionCreate(e.to_string());

        let mut builder = Session::builder().map_err(session_err)?;
        if options.xnnpack {
            builder = builder
                .with_execution_providers([XNNPACK::default().build()])
                .map_err(session_err)?;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(session_err)?
            .with_intra_threads(options.intra_threads.max(1))
            .map_err(session_err)?
            .commit_from_memory(bytes)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        debug!("Model inputs: {:?}, outputs: {:?}", input_names, output_names);

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }

    fn convert_input(tensor: &InputTensor) -> Result<SessionInputValue<'static>> {
        macro_rules! to_value {
            ($arr:expr) => {{
                let shape: Vec<i64> = $arr.shape().iter().map(|&s| s as i64).collect();
                let data = $arr.iter().cloned().collect::<Vec<_>>();
                Tensor::from_array((shape, data))
                    .map(Into::into)
                    .map_err(|e| InferenceError::InvalidInput(e.to_string()))
            }};
        }

        match tensor {
            InputTensor::Float32(arr) => to_value!(arr),
            InputTensor::Int64(arr) => to_value!(arr),
            InputTensor::Uint8(arr) => to_value!(arr),
        }
    }
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let ort_inputs = inputs
            .iter()
            .map(|(name, tensor)| Ok((*name, Self::convert_input(tensor)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::InferenceFailed(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        macro_rules! to_array {
            ($shape:expr, $data:expr) => {{
                let shape: Vec<usize> = $shape.iter().map(|&s| s as usize).collect();
                ArrayD::from_shape_vec(IxDyn(&shape), $data.to_vec())
                    .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?
            }};
        }

        let mut results = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                OutputTensor::Float32(to_array!(shape, data))
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
                OutputTensor::Int64(to_array!(shape, data))
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i32>() {
                OutputTensor::Int32(to_array!(shape, data))
            } else {
                return Err(InferenceError::OutputExtraction(format!(
                    "unsupported output type for '{name}'"
                )));
            };
            results.push((name.to_string(), tensor));
        }

        Ok(results)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
