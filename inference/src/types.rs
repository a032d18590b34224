//! Type definitions for digit classification

use crate::engine_trait::EngineType;
use crate::error::{ClassifierError, Result};
use crate::model_resource::ModelResource;
use crate::stack_blur::MAX_BLUR_RADIUS;
use image::{DynamicImage, Rgba, RgbaImage};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Number of digit classes the model scores (0-9)
pub const NUM_CLASSES: usize = 10;

/// Bytes per tensor element (f32)
pub const FLOAT_TYPE_SIZE: usize = 4;

/// Channels per pixel in the model input (grayscale)
pub const PIXEL_SIZE: usize = 1;

/// Resampling quality used when resizing to the model input size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeQuality {
    /// Nearest-neighbour sampling
    Nearest,
    /// Bilinear filtering
    #[default]
    Bilinear,
}

impl ResizeQuality {
    pub fn filter(self) -> image::imageops::FilterType {
        match self {
            ResizeQuality::Nearest => image::imageops::FilterType::Nearest,
            ResizeQuality::Bilinear => image::imageops::FilterType::Triangle,
        }
    }
}

/// Snapshot of a drawing canvas: a grid of RGBA pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    /// Wrap an RGBA image buffer
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Convert any decoded image
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            pixels: image.to_rgba8(),
        }
    }

    /// Load an image from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path)?;
        Ok(Self::from_dynamic(img))
    }

    /// Image filled with a single colour
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba(rgba)),
        }
    }

    /// Build from packed `0xAARRGGBB` words in row-major order
    pub fn from_argb(width: u32, height: u32, pixels: &[u32]) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(ClassifierError::size_mismatch(expected, pixels.len()));
        }

        let mut raw = Vec::with_capacity(expected * 4);
        for &p in pixels {
            raw.push((p >> 16 & 0xff) as u8);
            raw.push((p >> 8 & 0xff) as u8);
            raw.push((p & 0xff) as u8);
            raw.push((p >> 24 & 0xff) as u8);
        }

        let pixels = RgbaImage::from_raw(width, height, raw).ok_or_else(|| {
            ClassifierError::invalid_dimension(format!("cannot build {}x{} image", width, height))
        })?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// RGBA channels of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    /// Pixel at (x, y) packed as `0xAARRGGBB`
    pub fn argb(&self, x: u32, y: u32) -> u32 {
        let [r, g, b, a] = self.pixel(x, y);
        (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(pixels: RgbaImage) -> Self {
        Self::from_rgba(pixels)
    }
}

/// Grayscale intensities in [0, 1], one per pixel in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPixelBuffer {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl NormalizedPixelBuffer {
    pub fn new(values: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(ClassifierError::size_mismatch(expected, values.len()));
        }
        Ok(Self {
            values,
            width,
            height,
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

/// Renders as `[v0, v1, ...]`, the format used for exported training examples
impl fmt::Display for NormalizedPixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}", v)?;
        }
        f.write_str("]")
    }
}

/// Model input bytes: native-endian f32 values laid out row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorBuffer {
    bytes: Vec<u8>,
}

impl TensorBuffer {
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn element_count(&self) -> usize {
        self.bytes.len() / FLOAT_TYPE_SIZE
    }

    /// Decode the buffer back into f32 values
    pub fn to_floats(&self) -> Vec<f32> {
        self.bytes
            .chunks_exact(FLOAT_TYPE_SIZE)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// View the values as an array with the given dims (e.g. `[1, 28, 28, 1]`)
    pub fn to_array(&self, dims: &[usize]) -> Result<ArrayD<f32>> {
        ArrayD::from_shape_vec(IxDyn(dims), self.to_floats()).map_err(|e| {
            ClassifierError::inference(format!(
                "cannot shape {} values as {:?}: {}",
                self.element_count(),
                dims,
                e
            ))
        })
    }
}

/// Raw per-class model outputs. Not normalized: use for argmax only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVector([f32; NUM_CLASSES]);

impl ScoreVector {
    pub fn new(scores: [f32; NUM_CLASSES]) -> Self {
        Self(scores)
    }

    /// Build from engine output; anything other than 10 values is rejected
    pub fn from_slice(scores: &[f32]) -> Result<Self> {
        let array: [f32; NUM_CLASSES] = scores.try_into().map_err(|_| {
            ClassifierError::inference(format!(
                "expected {} output scores, got {}",
                NUM_CLASSES,
                scores.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, digit: usize) -> Option<f32> {
        self.0.get(digit).copied()
    }

    /// Index of the highest score; ties go to the lowest index
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &score) in self.0.iter().enumerate().skip(1) {
            if score > self.0[best] {
                best = i;
            }
        }
        best
    }
}

/// Predicted digit and its raw score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_digit: u8,
    /// Raw model score at `predicted_digit`. This is NOT a probability.
    pub confidence: f32,
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prediction Result: {}\nConfidence: {:.6}",
            self.predicted_digit, self.confidence
        )
    }
}

/// Input geometry of a loaded model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelShape {
    pub input_width: u32,
    pub input_height: u32,
    pub tensor_byte_size: usize,
}

impl ModelShape {
    pub fn new(input_width: u32, input_height: u32) -> Self {
        Self {
            input_width,
            input_height,
            tensor_byte_size: FLOAT_TYPE_SIZE
                * input_width as usize
                * input_height as usize
                * PIXEL_SIZE,
        }
    }

    /// Derive the shape from a model's declared input dims.
    ///
    /// Dims are dropped by position only: the leading batch dim when more
    /// than two are declared, then a single unit channel dim (last for
    /// NHWC, first for NCHW). The two that remain are (width, height) and
    /// may themselves be 1.
    pub fn from_input_dims(dims: &[i64]) -> Result<Self> {
        let unsupported = || {
            ClassifierError::invalid_dimension(format!(
                "unsupported model input shape {:?}: expected a single-channel 2-D image",
                dims
            ))
        };

        let body = if dims.len() > 2 { &dims[1..] } else { dims };
        let spatial = match body {
            [_, _] => body,
            [_, _, 1] => &body[..2],
            [1, _, _] => &body[1..],
            _ => return Err(unsupported()),
        };

        let side = |d: i64| -> Result<u32> {
            if d <= 0 {
                return Err(unsupported());
            }
            u32::try_from(d).map_err(|_| {
                ClassifierError::invalid_dimension(format!(
                    "model input dim {} in {:?} is too large",
                    d, dims
                ))
            })
        };
        Ok(Self::new(side(spatial[0])?, side(spatial[1])?))
    }

    pub fn element_count(&self) -> usize {
        self.input_width as usize * self.input_height as usize * PIXEL_SIZE
    }
}

/// Optional denoising pre-step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlurConfig {
    /// Resample factor applied before blurring
    pub scale: f32,
    /// Blur radius in pixels (0 = no-op)
    pub radius: u32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            radius: 1,
        }
    }
}

/// Configuration for the classification pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Directory holding bundled model resources
    pub asset_dir: PathBuf,

    /// Model resource name inside `asset_dir`
    pub model_file: String,

    /// Inference backend
    pub engine: EngineType,

    /// Declared input dims for the stub engine
    pub stub_input_dims: Vec<i64>,

    /// Resampling used to reach the model input size
    pub resize_quality: ResizeQuality,

    /// Blur applied before conversion, if any
    pub blur: Option<BlurConfig>,

    /// Upper bound on pooled worker threads
    pub max_worker_threads: usize,

    /// How long an idle worker thread is kept for reuse
    pub worker_keep_alive_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            model_file: "mnist.onnx".to_string(),
            engine: if cfg!(feature = "onnx") {
                EngineType::Onnx
            } else {
                EngineType::Stub
            },
            stub_input_dims: vec![1, 28, 28, 1],
            resize_quality: ResizeQuality::Bilinear,
            blur: None,
            max_worker_threads: 64,
            worker_keep_alive_ms: 60_000,
        }
    }
}

impl ClassifierConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise fail deep inside the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.model_file.trim().is_empty() {
            return Err(ClassifierError::config("model_file must not be empty"));
        }
        if self.max_worker_threads == 0 {
            return Err(ClassifierError::config("max_worker_threads must be at least 1"));
        }
        if let Some(blur) = &self.blur {
            if !blur.scale.is_finite() || blur.scale <= 0.0 {
                return Err(ClassifierError::config(format!(
                    "blur scale must be a positive number, got {}",
                    blur.scale
                )));
            }
            if blur.radius > MAX_BLUR_RADIUS {
                return Err(ClassifierError::config(format!(
                    "blur radius must be at most {}, got {}",
                    MAX_BLUR_RADIUS, blur.radius
                )));
            }
        }
        if self.engine == EngineType::Stub && self.stub_input_dims.is_empty() {
            return Err(ClassifierError::config("stub_input_dims must not be empty"));
        }
        Ok(())
    }

    /// The configured model resource
    pub fn model_resource(&self) -> ModelResource {
        ModelResource::named(&self.asset_dir, &self.model_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_round_trip() {
        let words = [0xff_ff_00_00, 0x80_00_ff_00, 0x00_00_00_ff, 0xff_12_34_56];
        let img = RasterImage::from_argb(2, 2, &words).unwrap();
        assert_eq!(img.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(img.pixel(1, 0), [0, 255, 0, 0x80]);
        assert_eq!(img.argb(1, 1), 0xff_12_34_56);
    }

    #[test]
    fn test_argb_length_checked() {
        let err = RasterImage::from_argb(3, 3, &[0; 4]).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::SizeMismatch {
                expected: 9,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_model_shape_from_dims() {
        let nhwc = ModelShape::from_input_dims(&[1, 28, 28, 1]).unwrap();
        assert_eq!(nhwc, ModelShape::new(28, 28));
        assert_eq!(nhwc.tensor_byte_size, 3136);
        assert_eq!(nhwc.element_count(), 784);

        let nchw = ModelShape::from_input_dims(&[1, 1, 28, 28]).unwrap();
        assert_eq!(nchw, nhwc);

        let dynamic_batch = ModelShape::from_input_dims(&[-1, 32, 24]).unwrap();
        assert_eq!((dynamic_batch.input_width, dynamic_batch.input_height), (32, 24));

        assert!(ModelShape::from_input_dims(&[1, 3, 28, 28]).is_err());
        assert!(ModelShape::from_input_dims(&[1, -1, -1, 1]).is_err());
        assert!(ModelShape::from_input_dims(&[784]).is_err());
        assert!(ModelShape::from_input_dims(&[1, 2, 28, 28, 1]).is_err());
    }

    #[test]
    fn test_model_shape_keeps_unit_spatial_dims() {
        // a one-pixel-tall strip in NHWC and NCHW layouts
        let nhwc = ModelShape::from_input_dims(&[1, 28, 1, 1]).unwrap();
        assert_eq!((nhwc.input_width, nhwc.input_height), (28, 1));
        assert_eq!(nhwc.tensor_byte_size, 112);

        let nchw = ModelShape::from_input_dims(&[1, 1, 1, 28]).unwrap();
        assert_eq!((nchw.input_width, nchw.input_height), (1, 28));

        let unbatched = ModelShape::from_input_dims(&[1, 1, 28]).unwrap();
        assert_eq!((unbatched.input_width, unbatched.input_height), (1, 28));

        let flat = ModelShape::from_input_dims(&[1, 784]).unwrap();
        assert_eq!((flat.input_width, flat.input_height), (1, 784));
    }

    #[test]
    fn test_model_shape_rejects_oversized_dims() {
        let too_wide = u32::MAX as i64 + 1;
        assert!(matches!(
            ModelShape::from_input_dims(&[1, too_wide, 28, 1]),
            Err(ClassifierError::InvalidDimension(_))
        ));
        assert!(ModelShape::from_input_dims(&[1, u32::MAX as i64, 1, 1]).is_ok());
    }

    #[test]
    fn test_score_vector_length() {
        assert!(ScoreVector::from_slice(&[0.0; 9]).is_err());
        let scores = ScoreVector::from_slice(&[0.5; NUM_CLASSES]).unwrap();
        assert_eq!(scores.get(9), Some(0.5));
        assert_eq!(scores.get(10), None);
    }

    #[test]
    fn test_argmax_ties_lowest_index() {
        let scores = ScoreVector::new([0.1, 0.7, 0.7, 0.0, 0.0, 0.0, 0.0, 0.7, 0.0, 0.0]);
        assert_eq!(scores.argmax(), 1);
    }

    #[test]
    fn test_pixel_buffer_display() {
        let buffer = NormalizedPixelBuffer::new(vec![0.0, 1.0, 0.5], 3, 1).unwrap();
        assert_eq!(buffer.to_string(), "[0.0, 1.0, 0.5]");
    }

    #[test]
    fn test_tensor_to_array() {
        let mut bytes = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let tensor = TensorBuffer::from_bytes(bytes);
        let array = tensor.to_array(&[1, 2, 2, 1]).unwrap();
        assert_eq!(array[[0, 1, 0, 0]], 3.0);
        assert!(tensor.to_array(&[1, 3, 3, 1]).is_err());
    }

    #[test]
    fn test_config_defaults_validate() {
        let config = ClassifierConfig::default();
        config.validate().unwrap();
        assert_eq!(config.blur, None);
        assert!(config.model_resource().name().ends_with("mnist.onnx"));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let mut config = ClassifierConfig::default();
        config.max_worker_threads = 0;
        assert!(matches!(config.validate(), Err(ClassifierError::Config(_))));

        let mut config = ClassifierConfig::default();
        config.blur = Some(BlurConfig {
            scale: -1.0,
            radius: 2,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_blur_radius_limit() {
        let mut config = ClassifierConfig::default();
        config.blur = Some(BlurConfig {
            scale: 1.0,
            radius: MAX_BLUR_RADIUS,
        });
        config.validate().unwrap();

        config.blur = Some(BlurConfig {
            scale: 1.0,
            radius: 4100,
        });
        assert!(matches!(config.validate(), Err(ClassifierError::Config(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        std::fs::write(&path, r#"{ "blur": { "scale": 1.0, "radius": 65535 } }"#).unwrap();
        assert!(matches!(
            ClassifierConfig::from_file(&path),
            Err(ClassifierError::Config(_))
        ));
    }

    #[test]
    fn test_config_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        std::fs::write(
            &path,
            r#"{ "model_file": "digits.onnx", "engine": "stub", "resize_quality": "nearest",
                "blur": { "scale": 0.5, "radius": 2 } }"#,
        )
        .unwrap();

        let config = ClassifierConfig::from_file(&path).unwrap();
        assert_eq!(config.model_file, "digits.onnx");
        assert_eq!(config.engine, EngineType::Stub);
        assert_eq!(config.resize_quality, ResizeQuality::Nearest);
        assert_eq!(config.blur.map(|b| b.radius), Some(2));
        assert_eq!(config.max_worker_threads, 64);
    }
}
