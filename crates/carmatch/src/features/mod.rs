//! Feature extraction: one comparable representation per strategy.

pub mod histogram;
pub mod keypoint;
pub mod template;

use image::RgbImage;

use crate::config::EngineConfig;
use crate::types::{Strategy, VisionResult};

pub use histogram::{extract_histogram, ColorHistogram};
pub use keypoint::{extract_keypoints, hamming_distance, Descriptor, Keypoint, KeypointFeatures};
pub use template::{extract_template, TemplateFeatures};

/// Features of one image. Only values of the same variant are comparable.
#[derive(Debug, Clone)]
pub enum FeatureSet {
    Keypoints(KeypointFeatures),
    Histogram(ColorHistogram),
    Template(TemplateFeatures),
}

impl FeatureSet {
    /// The strategy that produced these features.
    pub fn strategy(&self) -> Strategy {
        match self {
            FeatureSet::Keypoints(_) => Strategy::Keypoint,
            FeatureSet::Histogram(_) => Strategy::Histogram,
            FeatureSet::Template(_) => Strategy::Template,
        }
    }

    /// Number of elements: keypoints, histogram bins or pixels.
    pub fn len(&self) -> usize {
        match self {
            FeatureSet::Keypoints(k) => k.len(),
            FeatureSet::Histogram(h) => h.bins.len(),
            FeatureSet::Template(t) => t.pixels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extract features from a decoded image with the given strategy.
pub fn extract(
    image: &RgbImage,
    strategy: Strategy,
    config: &EngineConfig,
) -> VisionResult<FeatureSet> {
    match strategy {
        Strategy::Keypoint => extract_keypoints(image, &config.keypoint).map(FeatureSet::Keypoints),
        Strategy::Histogram => {
            extract_histogram(image, &config.histogram).map(FeatureSet::Histogram)
        }
        Strategy::Template => extract_template(image, &config.template).map(FeatureSet::Template),
    }
}
