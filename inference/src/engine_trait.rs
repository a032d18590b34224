/// Pluggable inference engines
///
/// The session only needs two things from a backend: the declared input
/// dims of the loaded model and a forward pass from tensor bytes to raw
/// class scores. Backends implement these traits.
use crate::error::Result;
use crate::types::TensorBuffer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A loaded model ready to run
pub trait InferenceEngine: Send {
    /// Declared input dims of the model, e.g. `[1, 28, 28, 1]`; dynamic dims are <= 0
    fn input_dims(&self) -> Vec<i64>;

    /// Run the forward pass and return the raw output scores
    fn run(&mut self, input: &TensorBuffer) -> Result<Vec<f32>>;

    /// Engine name (for logging/debugging)
    fn name(&self) -> &str;
}

/// Builds engines from model bytes
pub trait EngineLoader: Send + Sync {
    fn load(&self, model: &[u8]) -> Result<Box<dyn InferenceEngine>>;

    fn name(&self) -> &str;
}

/// Engine type enum for selecting a backend from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    /// ONNX Runtime (requires the `onnx` feature)
    Onnx,
    /// Deterministic stand-in engine
    Stub,
}

impl EngineType {
    /// Create a loader for this engine type
    pub fn loader(&self, stub_input_dims: &[i64]) -> Result<Arc<dyn EngineLoader>> {
        match self {
            #[cfg(feature = "onnx")]
            EngineType::Onnx => Ok(Arc::new(crate::engine_onnx::OnnxLoader::default())),
            #[cfg(not(feature = "onnx"))]
            EngineType::Onnx => Err(crate::error::ClassifierError::config(
                "engine 'onnx' requires building with the `onnx` feature",
            )),
            EngineType::Stub => Ok(Arc::new(crate::engine_stub::StubLoader::new(
                stub_input_dims.to_vec(),
            ))),
        }
    }
}
