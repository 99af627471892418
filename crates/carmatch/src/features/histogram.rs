//! Joint RGB color histograms.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::config::{HistogramConfig, MAX_CANONICAL_SIZE};
use crate::types::{VisionError, VisionResult};

/// A normalized joint color histogram with `bins_per_channel³` bins summing to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    pub bins_per_channel: usize,
    /// Flattened `[r][g][b]` bin weights.
    pub bins: Vec<f32>,
}

impl ColorHistogram {
    /// Weight of the bin at channel indices `(r, g, b)`.
    pub fn bin(&self, r: usize, g: usize, b: usize) -> f32 {
        let n = self.bins_per_channel;
        self.bins[(r * n + g) * n + b]
    }

    /// Sum of all bin weights. 1.0 for any extracted histogram.
    pub fn total(&self) -> f32 {
        self.bins.iter().sum()
    }
}

/// Resize to the canonical resolution and bin every pixel.
pub fn extract_histogram(image: &RgbImage, config: &HistogramConfig) -> VisionResult<ColorHistogram> {
    let n = config.bins_per_channel;
    if n == 0 || n > 256 {
        return Err(VisionError::InvalidInput(format!(
            "bins_per_channel must be in 1..=256, got {n}"
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(VisionError::Extraction("cannot bin an empty image".to_string()));
    }

    let size = config.canonical_size;
    if size == 0 || size > MAX_CANONICAL_SIZE {
        return Err(VisionError::InvalidInput(format!(
            "canonical_size must be in 1..={MAX_CANONICAL_SIZE}, got {size}"
        )));
    }
    let canonical = imageops::resize(image, size, size, FilterType::Triangle);

    let mut counts = vec![0u32; n * n * n];
    for pixel in canonical.pixels() {
        let [r, g, b] = pixel.0;
        let idx = (bin_index(r, n) * n + bin_index(g, n)) * n + bin_index(b, n);
        counts[idx] += 1;
    }

    let total = (u64::from(size) * u64::from(size)) as f32;

    Ok(ColorHistogram {
        bins_per_channel: n,
        bins: counts.into_iter().map(|c| c as f32 / total).collect(),
    })
}

fn bin_index(value: u8, bins: usize) -> usize {
    value as usize * bins / 256
}
