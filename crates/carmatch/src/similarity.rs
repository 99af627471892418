//! Similarity scoring between feature sets of the same strategy.

use crate::features::{hamming_distance, ColorHistogram, FeatureSet, KeypointFeatures, TemplateFeatures};
use crate::types::{VisionError, VisionResult};

/// Score two feature sets. Higher is more similar.
///
/// | Strategy  | Metric                                    | Range   |
/// |-----------|-------------------------------------------|---------|
/// | Keypoint  | cross-checked matches / min(count)        | [0, 1]  |
/// | Histogram | Pearson correlation of bin weights        | [-1, 1] |
/// | Template  | zero-mean normalized cross-correlation    | [-1, 1] |
pub fn score(a: &FeatureSet, b: &FeatureSet) -> VisionResult<f32> {
    match (a, b) {
        (FeatureSet::Keypoints(a), FeatureSet::Keypoints(b)) => Ok(keypoint_similarity(a, b)),
        (FeatureSet::Histogram(a), FeatureSet::Histogram(b)) => histogram_correlation(a, b),
        (FeatureSet::Template(a), FeatureSet::Template(b)) => template_correlation(a, b),
        _ => Err(VisionError::IncompatibleFeatures {
            left: a.strategy(),
            right: b.strategy(),
        }),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Pearson correlation: cosine similarity of the mean-centered vectors.
///
/// Returns 0.0 when either vector has zero variance.
pub fn pearson_correlation(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    cosine_similarity(&centered(a), &centered(b))
}

fn centered(v: &[f32]) -> Vec<f32> {
    let mean = v.iter().map(|&x| x as f64).sum::<f64>() / v.len() as f64;
    v.iter().map(|&x| (x as f64 - mean) as f32).collect()
}

/// Histogram correlation. Histograms must share a bin layout.
pub fn histogram_correlation(a: &ColorHistogram, b: &ColorHistogram) -> VisionResult<f32> {
    if a.bins_per_channel != b.bins_per_channel || a.bins.len() != b.bins.len() {
        return Err(VisionError::InvalidInput(format!(
            "histogram layouts differ: {} vs {} bins per channel",
            a.bins_per_channel, b.bins_per_channel
        )));
    }
    Ok(pearson_correlation(&a.bins, &b.bins))
}

/// Normalized cross-correlation of two equally sized templates.
pub fn template_correlation(a: &TemplateFeatures, b: &TemplateFeatures) -> VisionResult<f32> {
    if a.size != b.size || a.pixels.len() != b.pixels.len() {
        return Err(VisionError::InvalidInput(format!(
            "template sizes differ: {} vs {}",
            a.size, b.size
        )));
    }
    Ok(pearson_correlation(&a.pixels, &b.pixels))
}

/// Fraction of keypoints that found a mutual nearest neighbour.
///
/// Returns 0.0 when either side has no keypoints.
pub fn keypoint_similarity(a: &KeypointFeatures, b: &KeypointFeatures) -> f32 {
    let denom = a.len().min(b.len());
    if denom == 0 {
        return 0.0;
    }
    cross_check_matches(a, b).len() as f32 / denom as f32
}

/// Brute-force Hamming matching with cross-check.
///
/// Returns `(index_in_a, index_in_b)` pairs that are each other's nearest
/// neighbour. Every keypoint appears in at most one pair.
pub fn cross_check_matches(a: &KeypointFeatures, b: &KeypointFeatures) -> Vec<(usize, usize)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let forward: Vec<usize> = (0..a.len()).map(|i| nearest(a, i, b)).collect();
    let backward: Vec<usize> = (0..b.len()).map(|j| nearest(b, j, a)).collect();

    forward
        .iter()
        .enumerate()
        .filter(|&(i, &j)| backward[j] == i)
        .map(|(i, &j)| (i, j))
        .collect()
}

/// Index in `train` of the descriptor nearest to `query[idx]`.
///
/// Equal Hamming distances go to the spatially closer keypoint, then to the
/// lower index, so both matching directions resolve ties the same way.
fn nearest(query: &KeypointFeatures, idx: usize, train: &KeypointFeatures) -> usize {
    let q_desc = &query.descriptors[idx];
    let q_kp = &query.keypoints[idx];

    let mut best_idx = 0;
    let mut best_dist = u32::MAX;
    let mut best_spatial = f32::INFINITY;

    for (t_idx, (t_desc, t_kp)) in train.descriptors.iter().zip(train.keypoints.iter()).enumerate() {
        let dist = hamming_distance(q_desc, t_desc);
        if dist > best_dist {
            continue;
        }
        let dx = q_kp.x - t_kp.x;
        let dy = q_kp.y - t_kp.y;
        let spatial = dx * dx + dy * dy;
        if dist < best_dist || spatial < best_spatial {
            best_idx = t_idx;
            best_dist = dist;
            best_spatial = spatial;
        }
    }

    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Descriptor, Keypoint};

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint {
            x,
            y,
            angle: 0.0,
            scale: 1.0,
            response: 1.0,
        }
    }

    fn desc(fill: u8) -> Descriptor {
        [fill; 32]
    }

    fn features(points: &[(f32, f32, u8)]) -> KeypointFeatures {
        KeypointFeatures {
            keypoints: points.iter().map(|&(x, y, _)| kp(x, y)).collect(),
            descriptors: points.iter().map(|&(_, _, d)| desc(d)).collect(),
        }
    }

    fn histogram(bins: Vec<f32>) -> ColorHistogram {
        ColorHistogram {
            bins_per_channel: 2,
            bins,
        }
    }

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_pearson_ignores_offset_and_scale() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![10.0, 12.0, 14.0, 16.0];
        assert!((pearson_correlation(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![4.0, 3.0, 2.0, 1.0];
        assert!((pearson_correlation(&a, &c) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pearson_zero_variance_floor() {
        let flat = vec![0.125; 8];
        let other = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(pearson_correlation(&flat, &other), 0.0);
    }

    #[test]
    fn test_histogram_identical_and_symmetric() {
        let a = FeatureSet::Histogram(histogram(vec![0.5, 0.25, 0.0, 0.0, 0.125, 0.125, 0.0, 0.0]));
        let b = FeatureSet::Histogram(histogram(vec![0.0, 0.25, 0.25, 0.0, 0.0, 0.25, 0.0, 0.25]));

        assert!((score(&a, &a).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(score(&a, &b).unwrap(), score(&b, &a).unwrap());
    }

    #[test]
    fn test_histogram_layout_mismatch() {
        let a = histogram(vec![0.125; 8]);
        let b = ColorHistogram {
            bins_per_channel: 1,
            bins: vec![1.0],
        };
        assert!(histogram_correlation(&a, &b).is_err());
    }

    #[test]
    fn test_incompatible_variants() {
        let hist = FeatureSet::Histogram(histogram(vec![0.125; 8]));
        let kps = FeatureSet::Keypoints(features(&[(1.0, 1.0, 0)]));
        let err = score(&hist, &kps).unwrap_err();
        assert!(matches!(
            err,
            VisionError::IncompatibleFeatures {
                left: crate::types::Strategy::Histogram,
                right: crate::types::Strategy::Keypoint,
            }
        ));
    }

    #[test]
    fn test_keypoints_identical() {
        let a = features(&[(1.0, 1.0, 0x00), (5.0, 5.0, 0x0F), (9.0, 2.0, 0xF0)]);
        assert_eq!(keypoint_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_keypoints_duplicate_descriptors_resolved_spatially() {
        // Same descriptor at two locations: each must still pair with its own copy.
        let a = features(&[(10.0, 10.0, 0xAA), (40.0, 40.0, 0xAA)]);
        let matches = cross_check_matches(&a, &a);
        assert_eq!(matches, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_keypoints_each_train_claimed_once() {
        // Both query descriptors are nearest to b[0]; only one may keep it.
        let a = features(&[(0.0, 0.0, 0x01), (0.0, 0.0, 0x03)]);
        let b = features(&[(0.0, 0.0, 0x01), (0.0, 0.0, 0xFF)]);
        let matches = cross_check_matches(&a, &b);
        assert_eq!(matches, vec![(0, 0)]);
        assert_eq!(keypoint_similarity(&a, &b), 0.5);
    }

    #[test]
    fn test_keypoints_normalized_by_smaller_set() {
        let a = features(&[(1.0, 1.0, 0x00)]);
        let b = features(&[(1.0, 1.0, 0x00), (8.0, 8.0, 0xFF), (3.0, 9.0, 0x3C)]);
        assert_eq!(keypoint_similarity(&a, &b), 1.0);
        assert_eq!(keypoint_similarity(&b, &a), 1.0);
    }

    #[test]
    fn test_keypoints_empty_floor() {
        let empty = KeypointFeatures::default();
        let a = features(&[(1.0, 1.0, 0x00)]);
        assert_eq!(keypoint_similarity(&empty, &a), 0.0);
        assert_eq!(keypoint_similarity(&a, &empty), 0.0);
    }

    #[test]
    fn test_template_sizes_must_match() {
        let a = TemplateFeatures {
            size: 2,
            pixels: vec![0.0, 1.0, 2.0, 3.0],
        };
        let b = TemplateFeatures {
            size: 1,
            pixels: vec![5.0],
        };
        assert!(template_correlation(&a, &b).is_err());
        assert!((template_correlation(&a, &a).unwrap() - 1.0).abs() < 1e-6);
    }
}
