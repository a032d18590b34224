//! Stack blur: separable sliding-window blur for RGBA rasters
//!
//! Each output sample is a triangle-weighted average of the 2·r+1 samples
//! around it (centre weight r+1, edges weight 1), which approximates a
//! Gaussian. The window is slid with running in/out sums so the cost per
//! pixel does not depend on the radius. Borders replicate the edge pixel.

use crate::error::{ClassifierError, Result};
use crate::types::RasterImage;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::borrow::Cow;

/// Largest supported radius. The lookup table holds `256 * (radius + 1)²`
/// entries, about 16 MB at this limit.
pub const MAX_BLUR_RADIUS: u32 = 254;

type Rgb = [u8; 3];
type Sums = [u32; 3];

/// Reusable blur for a fixed radius
#[derive(Debug, Clone)]
pub struct StackBlurFilter {
    radius: u32,
    divisor: u32,
    /// Maps a weighted window sum to its average; 256 × divisor entries
    lut: Vec<u8>,
}

impl StackBlurFilter {
    /// Radii above [`MAX_BLUR_RADIUS`] are `InvalidDimension`
    pub fn new(radius: u32) -> Result<Self> {
        if radius > MAX_BLUR_RADIUS {
            return Err(ClassifierError::invalid_dimension(format!(
                "blur radius {} exceeds the maximum of {}",
                radius, MAX_BLUR_RADIUS
            )));
        }
        let divisor = (radius + 1)
            .checked_mul(radius + 1)
            .ok_or_else(|| ClassifierError::invalid_dimension("blur radius too large"))?;
        let lut_len = divisor
            .checked_mul(256)
            .ok_or_else(|| ClassifierError::invalid_dimension("blur radius too large"))?;
        let lut = (0..lut_len).map(|i| (i / divisor) as u8).collect();
        Ok(Self {
            radius,
            divisor,
            lut,
        })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Sum of the window weights, `(radius + 1)²`
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Blur a copy of `image`, first resampling it by `scale`.
    ///
    /// The output has the resampled size, which differs from the input
    /// when `scale != 1.0`. Alpha is copied through unchanged.
    pub fn blur(&self, image: &RasterImage, scale: f32) -> Result<RasterImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::invalid_dimension("cannot blur an empty image"));
        }
        let source = rescale(image.as_rgba(), scale)?;
        let (width, height) = source.dimensions();
        let (w, h) = (width as usize, height as usize);

        let rgb: Vec<Rgb> = source.pixels().map(|p| [p[0], p[1], p[2]]).collect();

        let mut rows = vec![[0u8; 3]; w * h];
        self.blur_lines(&rgb, &mut rows, w);

        let columns = transpose(&rows, w, h);
        let mut blurred = vec![[0u8; 3]; w * h];
        self.blur_lines(&columns, &mut blurred, h);

        let out = RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b] = blurred[x as usize * h + y as usize];
            Rgba([r, g, b, source.get_pixel(x, y)[3]])
        });
        Ok(RasterImage::from_rgba(out))
    }

    fn blur_lines(&self, src: &[Rgb], dst: &mut [Rgb], line_len: usize) {
        src.par_chunks(line_len)
            .zip(dst.par_chunks_mut(line_len))
            .for_each(|(line, out)| self.blur_line(line, out));
    }

    /// One 1-D pass over a line.
    ///
    /// `stack` holds the current window as a ring. `sum` is the weighted
    /// window total, `sum_out` the samples left of centre (inclusive) and
    /// `sum_in` the samples right of centre. Stepping right drops one
    /// weight from every outgoing sample and adds one to every incoming one.
    fn blur_line(&self, src: &[Rgb], dst: &mut [Rgb]) {
        let r = self.radius as usize;
        let div = 2 * r + 1;
        let last = src.len() - 1;

        let mut stack: Vec<Sums> = vec![[0; 3]; div];
        let mut sum: Sums = [0; 3];
        let mut sum_in: Sums = [0; 3];
        let mut sum_out: Sums = [0; 3];

        for (slot, entry) in stack.iter_mut().enumerate() {
            let offset = slot as isize - r as isize;
            let px = widen(src[offset.clamp(0, last as isize) as usize]);
            let weight = (r + 1 - offset.unsigned_abs()) as u32;
            *entry = px;
            for c in 0..3 {
                sum[c] += px[c] * weight;
            }
            if offset > 0 {
                add(&mut sum_in, &px);
            } else {
                add(&mut sum_out, &px);
            }
        }

        let mut pointer = r;
        for (x, out) in dst.iter_mut().enumerate() {
            *out = [
                self.lut[sum[0] as usize],
                self.lut[sum[1] as usize],
                self.lut[sum[2] as usize],
            ];

            sub(&mut sum, &sum_out);

            // oldest sample leaves the window, its slot takes the incoming one
            let start = (pointer + div - r) % div;
            sub(&mut sum_out, &stack[start]);
            let incoming = widen(src[(x + r + 1).min(last)]);
            stack[start] = incoming;
            add(&mut sum_in, &incoming);
            add(&mut sum, &sum_in);

            pointer = (pointer + 1) % div;
            let centre = stack[pointer];
            add(&mut sum_out, &centre);
            sub(&mut sum_in, &centre);
        }
    }
}

/// Blur `image` with a one-off filter
pub fn stack_blur(image: &RasterImage, scale: f32, radius: u32) -> Result<RasterImage> {
    StackBlurFilter::new(radius)?.blur(image, scale)
}

fn rescale(image: &RgbaImage, scale: f32) -> Result<Cow<'_, RgbaImage>> {
    if scale == 1.0 {
        return Ok(Cow::Borrowed(image));
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ClassifierError::invalid_dimension(format!(
            "blur scale must be positive, got {}",
            scale
        )));
    }

    let width = (image.width() as f32 * scale).round() as u32;
    let height = (image.height() as f32 * scale).round() as u32;
    if width == 0 || height == 0 {
        return Err(ClassifierError::invalid_dimension(format!(
            "scale {} turns {}x{} into an empty image",
            scale,
            image.width(),
            image.height()
        )));
    }

    Ok(Cow::Owned(image::imageops::resize(
        image,
        width,
        height,
        image::imageops::FilterType::Nearest,
    )))
}

fn transpose(src: &[Rgb], width: usize, height: usize) -> Vec<Rgb> {
    let mut out = vec![[0u8; 3]; width * height];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = src[y * width + x];
        }
    }
    out
}

#[inline]
fn widen(px: Rgb) -> Sums {
    [px[0] as u32, px[1] as u32, px[2] as u32]
}

#[inline]
fn add(acc: &mut Sums, v: &Sums) {
    for c in 0..3 {
        acc[c] += v[c];
    }
}

#[inline]
fn sub(acc: &mut Sums, v: &Sums) {
    for c in 0..3 {
        acc[c] -= v[c];
    }
}
