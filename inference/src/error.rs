//! Error types for the digit classifier

use std::any::Any;
use thiserror::Error;

/// Result type alias for the classifier library
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Boxed source error carried by [`ClassifierError::ModelLoad`]
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while preparing input or running classification
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimension(String),

    #[error("Tensor size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Model loading failed for '{resource}': {source}")]
    ModelLoad {
        resource: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Inference session is not initialized yet")]
    NotInitialized,

    #[error("Inference session is closed")]
    SessionClosed,

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Worker panicked during {task}: {message}")]
    WorkerPanic { task: &'static str, message: String },

    #[error("Work was dropped before it produced a result")]
    Abandoned,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClassifierError {
    pub fn invalid_dimension<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDimension(msg.into())
    }

    pub fn size_mismatch(expected: usize, actual: usize) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    pub fn model_load<R, E>(resource: R, source: E) -> Self
    where
        R: Into<String>,
        E: Into<BoxedSource>,
    {
        Self::ModelLoad {
            resource: resource.into(),
            source: source.into(),
        }
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Build a panic failure from a `catch_unwind` payload
    pub fn worker_panic(task: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::WorkerPanic { task, message }
    }

    /// True for session lifecycle misuse (not initialized or already closed)
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::SessionClosed)
    }
}
