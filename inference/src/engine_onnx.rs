//! ONNX Runtime engine
//!
//! Loads the model straight from the mapped resource bytes and reads the
//! declared input dims from the session's first input.

use crate::engine_trait::{EngineLoader, InferenceEngine};
use crate::error::{ClassifierError, Result};
use crate::types::TensorBuffer;
use log::{debug, info};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::{TensorRef, ValueType},
};

/// Builds [`OnnxEngine`]s
#[derive(Debug, Clone, Default)]
pub struct OnnxLoader {
    /// Number of intra-op threads (ONNX Runtime default when `None`)
    pub intra_threads: Option<usize>,
}

impl EngineLoader for OnnxLoader {
    fn load(&self, model: &[u8]) -> Result<Box<dyn InferenceEngine>> {
        info!("Initializing ONNX Runtime engine ({} bytes)", model.len());

        let mut builder = Session::builder()
            .map_err(|e| ClassifierError::model_load("onnx", e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifierError::model_load("onnx", e.to_string()))?;

        if let Some(threads) = self.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| ClassifierError::model_load("onnx", e.to_string()))?;
        }

        let session = builder
            .commit_from_memory(model)
            .map_err(|e| {
                ClassifierError::model_load("onnx", format!("Failed to load model: {}", e))
            })?;

        let input_dims = match session.inputs.first().map(|input| &input.input_type) {
            Some(ValueType::Tensor { shape, .. }) => shape.iter().copied().collect::<Vec<i64>>(),
            Some(other) => {
                return Err(ClassifierError::model_load(
                    "onnx",
                    format!("model input is not a tensor: {:?}", other),
                ))
            }
            None => return Err(ClassifierError::model_load("onnx", "model declares no inputs")),
        };

        info!("✓ Model loaded successfully, input dims {:?}", input_dims);
        Ok(Box::new(OnnxEngine {
            session,
            input_dims,
        }))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// ONNX Runtime session wrapper
pub struct OnnxEngine {
    session: Session,
    input_dims: Vec<i64>,
}

impl InferenceEngine for OnnxEngine {
    fn input_dims(&self) -> Vec<i64> {
        self.input_dims.clone()
    }

    fn run(&mut self, input: &TensorBuffer) -> Result<Vec<f32>> {
        // dynamic dims (batch) run with size 1
        let dims: Vec<usize> = self
            .input_dims
            .iter()
            .map(|&d| if d > 0 { d as usize } else { 1 })
            .collect();
        let array = input.to_array(&dims)?;

        let tensor_ref = TensorRef::from_array_view(&array)
            .map_err(|e| ClassifierError::inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ClassifierError::inference(e.to_string()))?;

        let (shape, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::inference(e.to_string()))?;
        debug!("ONNX output shape {:?}", shape);

        Ok(scores.to_vec())
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
