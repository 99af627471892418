//! ORB-style keypoints: FAST corners on an image pyramid, intensity-centroid
//! orientation, and steered BRIEF descriptors.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::KeypointConfig;
use crate::types::{VisionError, VisionResult};

/// 256-bit binary descriptor.
pub const DESCRIPTOR_BYTES: usize = 32;

pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// Radius of the orientation and descriptor patch (31x31).
const PATCH_RADIUS: i32 = 15;

/// Keypoints keep this far from the border so a rotated patch stays inside the image.
const EDGE_MARGIN: i32 = 22;

/// Seed for the BRIEF sampling pattern. Changing it invalidates every stored descriptor.
const BRIEF_SEED: u64 = 0x0B5E_55ED;

/// Gaussian smoothing applied before BRIEF intensity tests.
const BRIEF_SIGMA: f32 = 2.0;

/// A detected keypoint in working-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Orientation in radians.
    pub angle: f32,
    /// Pyramid scale the keypoint was detected at (1.0 = full resolution).
    pub scale: f32,
    pub response: f32,
}

/// Keypoints and their descriptors, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct KeypointFeatures {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl KeypointFeatures {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Number of differing bits between two descriptors.
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

struct PyramidLevel {
    gray: GrayImage,
    smoothed: GrayImage,
    scale: f32,
}

struct Corner {
    x: i32,
    y: i32,
    level: usize,
    response: f32,
}

/// Detect up to `config.max_keypoints` keypoints and describe each one.
///
/// Fails with [`VisionError::Extraction`] when nothing survives detection,
/// e.g. for flat images or images smaller than the descriptor patch.
pub fn extract_keypoints(
    image: &RgbImage,
    config: &KeypointConfig,
) -> VisionResult<KeypointFeatures> {
    let base = working_image(image, config.max_dimension);
    let pyramid = build_pyramid(&base, config);

    let mut corners = Vec::new();
    for (level, layer) in pyramid.iter().enumerate() {
        detect_fast(&layer.gray, config.fast_threshold, level, &mut corners);
    }

    // Stable sort: equal responses keep level/raster order.
    corners.sort_by(|a, b| {
        b.response
            .partial_cmp(&a.response)
            .unwrap_or(Ordering::Equal)
    });

    let pattern = brief_pattern();
    let mut seen = HashSet::new();
    let mut features = KeypointFeatures::default();

    for corner in corners {
        if features.len() >= config.max_keypoints {
            break;
        }

        let layer = &pyramid[corner.level];
        let x = corner.x as f32 * layer.scale;
        let y = corner.y as f32 * layer.scale;
        if !seen.insert((x.round() as i32, y.round() as i32)) {
            continue;
        }

        let angle = intensity_centroid_angle(&layer.gray, corner.x, corner.y);
        let descriptor = steered_brief(&layer.smoothed, corner.x, corner.y, angle, pattern);

        features.keypoints.push(Keypoint {
            x,
            y,
            angle,
            scale: layer.scale,
            response: corner.response,
        });
        features.descriptors.push(descriptor);
    }

    if features.is_empty() {
        return Err(VisionError::Extraction(format!(
            "no keypoints detected in {}x{} image",
            image.width(),
            image.height()
        )));
    }

    tracing::debug!(
        "Extracted {} keypoints over {} pyramid levels",
        features.len(),
        pyramid.len()
    );
    Ok(features)
}

fn working_image(image: &RgbImage, max_dimension: u32) -> GrayImage {
    let gray = imageops::grayscale(image);
    let (w, h) = gray.dimensions();
    let longest = w.max(h);
    if longest <= max_dimension {
        return gray;
    }

    let ratio = max_dimension as f32 / longest as f32;
    let new_w = ((w as f32 * ratio).round() as u32).max(1);
    let new_h = ((h as f32 * ratio).round() as u32).max(1);
    imageops::resize(&gray, new_w, new_h, FilterType::Triangle)
}

fn build_pyramid(base: &GrayImage, config: &KeypointConfig) -> Vec<PyramidLevel> {
    let min_side = (2 * EDGE_MARGIN + 1) as u32;
    let mut levels = Vec::with_capacity(config.pyramid_levels);
    let mut scale = 1.0f32;

    for level in 0..config.pyramid_levels {
        let w = (base.width() as f32 / scale).round() as u32;
        let h = (base.height() as f32 / scale).round() as u32;
        if w < min_side || h < min_side {
            break;
        }

        let gray = if level == 0 {
            base.clone()
        } else {
            imageops::resize(base, w, h, FilterType::Triangle)
        };
        let smoothed = gaussian_blur_f32(&gray, BRIEF_SIGMA);
        levels.push(PyramidLevel {
            gray,
            smoothed,
            scale,
        });

        scale *= config.scale_factor;
    }

    levels
}

/// FAST-9 corners inside the descriptor margin, thinned by 3x3 non-max suppression.
fn detect_fast(img: &GrayImage, threshold: u8, level: usize, out: &mut Vec<Corner>) {
    let w = img.width() as i32;
    let h = img.height() as i32;
    let mut scores = vec![0.0f32; (w * h) as usize];

    for corner in corners_fast9(img, threshold) {
        let (x, y) = (corner.x as i32, corner.y as i32);
        if x < EDGE_MARGIN || y < EDGE_MARGIN || x >= w - EDGE_MARGIN || y >= h - EDGE_MARGIN {
            continue;
        }
        // Score is the highest threshold the corner still passes, never below `threshold`.
        scores[(y * w + x) as usize] = corner.score;
    }

    for y in EDGE_MARGIN..h - EDGE_MARGIN {
        for x in EDGE_MARGIN..w - EDGE_MARGIN {
            let response = scores[(y * w + x) as usize];
            if response > 0.0 && is_local_max(&scores, w, x, y) {
                out.push(Corner {
                    x,
                    y,
                    level,
                    response,
                });
            }
        }
    }
}

/// 3x3 non-maximum suppression. Plateaus keep their first pixel in raster order.
fn is_local_max(scores: &[f32], w: i32, x: i32, y: i32) -> bool {
    let s = scores[(y * w + x) as usize];
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let n = scores[((y + dy) * w + (x + dx)) as usize];
            let earlier = dy < 0 || (dy == 0 && dx < 0);
            if n > s || (n == s && earlier) {
                return false;
            }
        }
    }
    true
}

fn intensity_centroid_angle(img: &GrayImage, cx: i32, cy: i32) -> f32 {
    let mut m01 = 0.0f64;
    let mut m10 = 0.0f64;
    let r2 = PATCH_RADIUS * PATCH_RADIUS;

    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = img.get_pixel((cx + dx) as u32, (cy + dy) as u32)[0] as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }

    m01.atan2(m10) as f32
}

type BriefPair = (i8, i8, i8, i8);

fn brief_pattern() -> &'static [BriefPair] {
    static PATTERN: OnceLock<Vec<BriefPair>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(BRIEF_SEED);
        let r = PATCH_RADIUS as i8;
        (0..DESCRIPTOR_BYTES * 8)
            .map(|_| {
                (
                    rng.gen_range(-r..=r),
                    rng.gen_range(-r..=r),
                    rng.gen_range(-r..=r),
                    rng.gen_range(-r..=r),
                )
            })
            .collect()
    })
}

fn steered_brief(img: &GrayImage, cx: i32, cy: i32, angle: f32, pattern: &[BriefPair]) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let max_x = img.width() as i32 - 1;
    let max_y = img.height() as i32 - 1;

    let sample = |px: i8, py: i8| -> u8 {
        let (fx, fy) = (px as f32, py as f32);
        let x = (cx as f32 + cos * fx - sin * fy).round() as i32;
        let y = (cy as f32 + sin * fx + cos * fy).round() as i32;
        img.get_pixel(x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32)[0]
    };

    let mut descriptor = [0u8; DESCRIPTOR_BYTES];
    for (i, &(x1, y1, x2, y2)) in pattern.iter().enumerate() {
        if sample(x1, y1) < sample(x2, y2) {
            descriptor[i / 8] |= 1 << (7 - i % 8);
        }
    }
    descriptor
}
