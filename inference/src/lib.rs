//! Handwritten Digit Classification Library
//!
//! On-device recognition of a single hand-drawn digit. A canvas raster is
//! optionally blurred, downscaled to the model's input size, converted to
//! grayscale intensities, packed into a float tensor and run through a
//! pluggable inference engine. Work runs on a background pool and reports
//! through write-once completion handles.

pub mod classifier;
pub mod completion;
pub mod engine_stub;
pub mod engine_trait;
pub mod error;
pub mod export;
pub mod model_resource;
pub mod postprocessing;
pub mod preprocessing;
pub mod session;
pub mod stack_blur;
pub mod types;

#[cfg(feature = "onnx")]
pub mod engine_onnx;

pub use classifier::ClassificationPipeline;
pub use completion::{completion, Completion, CompletionSource};
pub use engine_stub::StubLoader;
pub use engine_trait::{EngineLoader, EngineType, InferenceEngine};
pub use error::{ClassifierError, Result};
pub use export::ExampleLog;
pub use model_resource::ModelResource;
pub use postprocessing::decode_scores;
pub use preprocessing::{ImagePreprocessor, PixelConverter, TensorPacker};
pub use session::{InferenceSession, SessionStatus};
pub use stack_blur::{stack_blur, StackBlurFilter, MAX_BLUR_RADIUS};
pub use types::{
    BlurConfig, ClassificationResult, ClassifierConfig, ModelShape, NormalizedPixelBuffer,
    RasterImage, ResizeQuality, ScoreVector, TensorBuffer, NUM_CLASSES,
};

#[cfg(feature = "onnx")]
pub use engine_onnx::OnnxLoader;

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
