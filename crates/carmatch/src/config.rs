//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{VisionError, VisionResult};

/// Largest canonical side accepted for histogram and template resizing.
pub const MAX_CANONICAL_SIZE: u32 = 4096;

/// Settings for the ORB-style keypoint extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypointConfig {
    /// Upper bound on keypoints kept per image, strongest first.
    pub max_keypoints: usize,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    pub pyramid_levels: usize,
    pub scale_factor: f32,
    /// Longest side of the grayscale working image.
    pub max_dimension: u32,
}

impl Default for KeypointConfig {
    fn default() -> Self {
        Self {
            max_keypoints: 500,
            fast_threshold: 20,
            pyramid_levels: 4,
            scale_factor: 1.2,
            max_dimension: 640,
        }
    }
}

/// Settings for the color histogram extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub bins_per_channel: usize,
    /// Images are resized to `canonical_size` x `canonical_size` before binning.
    pub canonical_size: u32,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins_per_channel: 8,
            canonical_size: 256,
        }
    }
}

/// Settings for the template correlation extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub canonical_size: u32,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            canonical_size: 256,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub keypoint: KeypointConfig,
    pub histogram: HistogramConfig,
    pub template: TemplateConfig,
    /// Scan the catalog on the rayon worker pool.
    pub parallel: bool,
}

impl EngineConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> VisionResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Reject settings the extractors cannot work with.
    pub fn validate(&self) -> VisionResult<()> {
        let kp = &self.keypoint;
        if kp.max_keypoints == 0 {
            return Err(invalid("keypoint.max_keypoints must be at least 1"));
        }
        if kp.fast_threshold == 0 {
            return Err(invalid("keypoint.fast_threshold must be at least 1"));
        }
        if kp.pyramid_levels == 0 {
            return Err(invalid("keypoint.pyramid_levels must be at least 1"));
        }
        if !(kp.scale_factor > 1.0) {
            return Err(invalid("keypoint.scale_factor must be greater than 1.0"));
        }
        if kp.max_dimension < 64 {
            return Err(invalid("keypoint.max_dimension must be at least 64"));
        }

        let bins = self.histogram.bins_per_channel;
        if bins == 0 || bins > 256 {
            return Err(invalid("histogram.bins_per_channel must be in 1..=256"));
        }
        if !(1..=MAX_CANONICAL_SIZE).contains(&self.histogram.canonical_size) {
            return Err(invalid("histogram.canonical_size must be in 1..=4096"));
        }
        if !(2..=MAX_CANONICAL_SIZE).contains(&self.template.canonical_size) {
            return Err(invalid("template.canonical_size must be in 2..=4096"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> VisionError {
    VisionError::InvalidInput(msg.to_string())
}
