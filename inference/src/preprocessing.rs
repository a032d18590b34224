//! Image preprocessing: canvas raster to normalized pixels to model tensor

use crate::error::{ClassifierError, Result};
use crate::stack_blur::StackBlurFilter;
use crate::types::{
    BlurConfig, ModelShape, NormalizedPixelBuffer, RasterImage, ResizeQuality, TensorBuffer,
    FLOAT_TYPE_SIZE,
};
use image::RgbaImage;
use std::borrow::Cow;

/// Converts a raster into grayscale intensities in [0, 1]
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelConverter {
    quality: ResizeQuality,
}

impl PixelConverter {
    pub fn new(quality: ResizeQuality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> ResizeQuality {
        self.quality
    }

    /// Resize to the target size and convert each pixel to (R + G + B) / 3 / 255.
    ///
    /// The unweighted average matches the distribution the model was trained
    /// on; do not swap it for perceptual luma. Alpha is ignored.
    pub fn convert(
        &self,
        image: &RasterImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<NormalizedPixelBuffer> {
        if target_width == 0 || target_height == 0 {
            return Err(ClassifierError::invalid_dimension(format!(
                "target size must be positive, got {}x{}",
                target_width, target_height
            )));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::invalid_dimension("source image is empty"));
        }

        let resized = self.resize(image.as_rgba(), target_width, target_height);

        let values = resized
            .pixels()
            .map(|p| {
                let [r, g, b, _] = p.0;
                (r as u32 + g as u32 + b as u32) as f32 / 3.0 / 255.0
            })
            .collect();

        NormalizedPixelBuffer::new(values, target_width, target_height)
    }

    fn resize<'a>(&self, image: &'a RgbaImage, width: u32, height: u32) -> Cow<'a, RgbaImage> {
        if image.dimensions() == (width, height) {
            return Cow::Borrowed(image);
        }
        Cow::Owned(image::imageops::resize(
            image,
            width,
            height,
            self.quality.filter(),
        ))
    }
}

/// Serializes normalized pixels into the engine's input byte layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorPacker {
    element_count: usize,
}

impl TensorPacker {
    /// Packer sized for a loaded model; the size never changes afterwards
    pub fn new(shape: &ModelShape) -> Self {
        Self {
            element_count: shape.element_count(),
        }
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn byte_size(&self) -> usize {
        self.element_count * FLOAT_TYPE_SIZE
    }

    /// Write each value as a native-endian f32.
    ///
    /// A length mismatch means the converter and packer disagree on the model
    /// shape; it is reported rather than truncated or padded.
    pub fn pack(&self, buffer: &NormalizedPixelBuffer) -> Result<TensorBuffer> {
        if buffer.len() != self.element_count {
            return Err(ClassifierError::size_mismatch(
                self.element_count,
                buffer.len(),
            ));
        }

        let mut bytes = Vec::with_capacity(self.byte_size());
        for value in buffer.as_slice() {
            bytes.extend_from_slice(&value.to_ne_bytes());
        }
        Ok(TensorBuffer::from_bytes(bytes))
    }
}

/// Preprocessing stages run for every classification
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    converter: PixelConverter,
    blur: Option<(StackBlurFilter, f32)>,
}

impl ImagePreprocessor {
    pub fn new(quality: ResizeQuality) -> Self {
        Self {
            converter: PixelConverter::new(quality),
            blur: None,
        }
    }

    /// Blur the raster before conversion
    pub fn with_blur(mut self, blur: BlurConfig) -> Result<Self> {
        self.blur = Some((StackBlurFilter::new(blur.radius)?, blur.scale));
        Ok(self)
    }

    /// Optional blur, then resize and normalize to the model input size
    pub fn normalize(
        &self,
        image: &RasterImage,
        shape: &ModelShape,
    ) -> Result<NormalizedPixelBuffer> {
        let source = match &self.blur {
            Some((filter, scale)) => Cow::Owned(filter.blur(image, *scale)?),
            None => Cow::Borrowed(image),
        };
        self.converter
            .convert(&source, shape.input_width, shape.input_height)
    }

    /// Full preprocessing: normalize then pack
    pub fn prepare(
        &self,
        image: &RasterImage,
        shape: &ModelShape,
        packer: &TensorPacker,
    ) -> Result<TensorBuffer> {
        let pixels = self.normalize(image, shape)?;
        packer.pack(&pixels)
    }
}
