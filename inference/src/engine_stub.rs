// Deterministic stand-in engine for tests, benches and demos that run
// without an ONNX Runtime build. It one-hot scores the mean intensity of
// the input tensor: an all-black drawing scores highest at digit 0, an
// all-white one at digit 9.

use crate::engine_trait::{EngineLoader, InferenceEngine};
use crate::error::{ClassifierError, Result};
use crate::types::{TensorBuffer, NUM_CLASSES};

/// Loader for [`StubEngine`]
#[derive(Debug, Clone)]
pub struct StubLoader {
    input_dims: Vec<i64>,
}

impl StubLoader {
    /// Engines produced by this loader declare `input_dims`
    pub fn new(input_dims: Vec<i64>) -> Self {
        Self { input_dims }
    }
}

impl EngineLoader for StubLoader {
    fn load(&self, model: &[u8]) -> Result<Box<dyn InferenceEngine>> {
        if model.is_empty() {
            return Err(ClassifierError::model_load("stub", "no model bytes"));
        }
        log::info!(
            "Creating stub engine ({} model bytes ignored, input {:?})",
            model.len(),
            self.input_dims
        );
        Ok(Box::new(StubEngine {
            input_dims: self.input_dims.clone(),
        }))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Scores a tensor by its mean value
#[derive(Debug, Clone)]
pub struct StubEngine {
    input_dims: Vec<i64>,
}

impl InferenceEngine for StubEngine {
    fn input_dims(&self) -> Vec<i64> {
        self.input_dims.clone()
    }

    fn run(&mut self, input: &TensorBuffer) -> Result<Vec<f32>> {
        let values = input.to_floats();
        if values.is_empty() {
            return Err(ClassifierError::inference("empty input tensor"));
        }

        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let digit = ((mean.clamp(0.0, 1.0) * 9.0).round() as usize).min(NUM_CLASSES - 1);

        let mut scores = vec![0.0; NUM_CLASSES];
        scores[digit] = 1.0;
        Ok(scores)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::TensorPacker;
    use crate::types::{ModelShape, NormalizedPixelBuffer};

    fn tensor(value: f32) -> TensorBuffer {
        let shape = ModelShape::new(4, 4);
        let pixels = NormalizedPixelBuffer::new(vec![value; 16], 4, 4).unwrap();
        TensorPacker::new(&shape).pack(&pixels).unwrap()
    }

    #[test]
    fn test_stub_scores_by_mean() {
        let mut engine = StubLoader::new(vec![1, 4, 4, 1]).load(&[0u8]).unwrap();

        let black = engine.run(&tensor(0.0)).unwrap();
        assert_eq!(black.len(), NUM_CLASSES);
        assert_eq!(black[0], 1.0);

        let white = engine.run(&tensor(1.0)).unwrap();
        assert_eq!(white[9], 1.0);

        let grey = engine.run(&tensor(0.5)).unwrap();
        assert_eq!(grey[5], 1.0);
    }

    #[test]
    fn test_stub_rejects_empty_model() {
        assert!(matches!(
            StubLoader::new(vec![1, 28, 28]).load(&[]),
            Err(ClassifierError::ModelLoad { .. })
        ));
    }
}
