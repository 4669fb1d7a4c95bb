//! Tensor types for inference input/output.

use ndarray::{ArrayD, IxDyn};

use crate::{InferenceError, Result};

/// Supported tensor element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Float32,
    Int64,
    Uint8,
}

/// Input tensor for inference.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
    Uint8(ArrayD<u8>),
}

impl InputTensor {
    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
            InputTensor::Int64(arr) => arr.shape(),
            InputTensor::Uint8(arr) => arr.shape(),
        }
    }

    /// Element type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            InputTensor::Float32(_) => TensorType::Float32,
            InputTensor::Int64(_) => TensorType::Int64,
            InputTensor::Uint8(_) => TensorType::Uint8,
        }
    }

    /// Build a Float32 tensor from raw data and a shape.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(InputTensor::Float32)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
    Int32(ArrayD<i32>),
}

impl OutputTensor {
    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
            OutputTensor::Int32(arr) => arr.shape(),
        }
    }

    /// The inner Float32 array, if that is the element type.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }

    /// Consume the tensor, returning the Float32 array or an error naming `what`.
    pub fn into_f32(self, what: &str) -> Result<ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Ok(arr),
            other => Err(InferenceError::OutputExtraction(format!(
                "{what}: expected f32 tensor, got shape {:?} of another type",
                other.shape()
            ))),
        }
    }
}
