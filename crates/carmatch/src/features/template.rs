//! Canonical grayscale templates for whole-image correlation.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::config::{TemplateConfig, MAX_CANONICAL_SIZE};
use crate::types::{VisionError, VisionResult};

/// Intensity variance below which an image counts as flat.
const MIN_VARIANCE: f64 = 1e-6;

/// A `size` x `size` grayscale image stored row-major as f32 intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFeatures {
    pub size: u32,
    pub pixels: Vec<f32>,
}

/// Resize to the canonical resolution and convert to grayscale.
pub fn extract_template(image: &RgbImage, config: &TemplateConfig) -> VisionResult<TemplateFeatures> {
    let size = config.canonical_size;
    if size == 0 || size > MAX_CANONICAL_SIZE {
        return Err(VisionError::InvalidInput(format!(
            "canonical_size must be in 1..={MAX_CANONICAL_SIZE}, got {size}"
        )));
    }
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let gray = imageops::grayscale(&resized);

    let pixels: Vec<f32> = gray.pixels().map(|p| p[0] as f32).collect();
    if pixels.is_empty() {
        return Err(VisionError::Extraction("canonical template is empty".to_string()));
    }

    let n = pixels.len() as f64;
    let mean = pixels.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = pixels
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    if variance < MIN_VARIANCE {
        return Err(VisionError::Extraction(
            "image is flat; nothing to correlate".to_string(),
        ));
    }

    Ok(TemplateFeatures { size, pixels })
}
