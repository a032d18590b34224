//! Inference session lifecycle
//!
//! `Uninitialized -> Ready -> Closed`, never backwards. The model shape and
//! the tensor packer only exist inside the `Ready` state, so nothing that
//! needs them can run before the model is loaded.

use crate::engine_trait::{EngineLoader, InferenceEngine};
use crate::error::{ClassifierError, Result};
use crate::model_resource::ModelResource;
use crate::preprocessing::TensorPacker;
use crate::types::{ModelShape, ScoreVector, TensorBuffer};
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Ready,
    Closed,
}

/// Loaded engine plus everything derived from it
pub struct ReadySession {
    engine: Box<dyn InferenceEngine>,
    shape: ModelShape,
    packer: TensorPacker,
}

impl ReadySession {
    pub fn shape(&self) -> ModelShape {
        self.shape
    }

    pub fn packer(&self) -> &TensorPacker {
        &self.packer
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Forward pass; the tensor must match the model size exactly
    pub fn classify(&mut self, tensor: &TensorBuffer) -> Result<ScoreVector> {
        if tensor.byte_len() != self.shape.tensor_byte_size {
            return Err(ClassifierError::size_mismatch(
                self.packer.element_count(),
                tensor.element_count(),
            ));
        }
        let scores = self.engine.run(tensor)?;
        ScoreVector::from_slice(&scores)
    }
}

enum SessionState {
    Uninitialized,
    Ready(ReadySession),
    Closed,
}

/// Owns the loaded model and serves synchronous classification
pub struct InferenceSession {
    loader: Arc<dyn EngineLoader>,
    state: SessionState,
}

impl InferenceSession {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            state: SessionState::Uninitialized,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Uninitialized => SessionStatus::Uninitialized,
            SessionState::Ready(_) => SessionStatus::Ready,
            SessionState::Closed => SessionStatus::Closed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    /// Load the model and derive its input shape.
    ///
    /// On failure the session stays `Uninitialized` and may be retried.
    /// An already-ready session keeps its engine and returns its shape.
    pub fn initialize(&mut self, resource: &ModelResource) -> Result<ModelShape> {
        match &self.state {
            SessionState::Ready(ready) => {
                debug!("Session already initialized, keeping current model");
                return Ok(ready.shape);
            }
            SessionState::Closed => return Err(ClassifierError::SessionClosed),
            SessionState::Uninitialized => {}
        }

        let start = Instant::now();
        let bytes = resource.open()?;
        let engine = self.loader.load(&bytes).map_err(|e| match e {
            ClassifierError::ModelLoad { source, .. } => ClassifierError::ModelLoad {
                resource: resource.name(),
                source,
            },
            other => ClassifierError::model_load(resource.name(), other),
        })?;

        let dims = engine.input_dims();
        let shape = ModelShape::from_input_dims(&dims)
            .map_err(|e| ClassifierError::model_load(resource.name(), e))?;

        info!(
            "Initialized {} engine from '{}' in {:.1}ms: input {}x{} ({} bytes)",
            engine.name(),
            resource.name(),
            start.elapsed().as_secs_f32() * 1000.0,
            shape.input_width,
            shape.input_height,
            shape.tensor_byte_size
        );

        self.state = SessionState::Ready(ReadySession {
            engine,
            shape,
            packer: TensorPacker::new(&shape),
        });
        Ok(shape)
    }

    /// Borrow the ready state, or the lifecycle error explaining why not
    pub fn ready(&self) -> Result<&ReadySession> {
        match &self.state {
            SessionState::Ready(ready) => Ok(ready),
            SessionState::Uninitialized => Err(ClassifierError::NotInitialized),
            SessionState::Closed => Err(ClassifierError::SessionClosed),
        }
    }

    pub fn ready_mut(&mut self) -> Result<&mut ReadySession> {
        match &mut self.state {
            SessionState::Ready(ready) => Ok(ready),
            SessionState::Uninitialized => Err(ClassifierError::NotInitialized),
            SessionState::Closed => Err(ClassifierError::SessionClosed),
        }
    }

    pub fn model_shape(&self) -> Option<ModelShape> {
        self.ready().ok().map(|ready| ready.shape)
    }

    pub fn classify(&mut self, tensor: &TensorBuffer) -> Result<ScoreVector> {
        self.ready_mut()?.classify(tensor)
    }

    /// Release the engine. Closing twice, or before initializing, is a no-op.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Ready(ready) => {
                let name = ready.engine_name().to_string();
                drop(ready);
                info!("Closed {} engine", name);
            }
            SessionState::Uninitialized => {
                debug!("Closing a session that was never initialized");
            }
            SessionState::Closed => {
                debug!("Session already closed");
            }
        }
    }
}
