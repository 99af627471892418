//! The matching engine: decode, extract, score, select.

use std::sync::Arc;

use crate::catalog::ImageSource;
use crate::config::EngineConfig;
use crate::decode::decode_image;
use crate::features::{extract, FeatureSet};
use crate::selector::{MatchSelector, ScanReport};
use crate::similarity::score;
use crate::types::{MatchCandidate, MatchResult, ReferenceEntry, Strategy, VisionResult};

/// Matches query images against a labelled catalog.
///
/// Reference images are fetched through the injected [`ImageSource`]. Nothing is
/// cached between calls; every query re-extracts every reference.
pub struct MatchingEngine {
    config: EngineConfig,
    images: Arc<dyn ImageSource>,
}

impl MatchingEngine {
    /// Create an engine, rejecting invalid configuration.
    pub fn new(config: EngineConfig, images: Arc<dyn ImageSource>) -> VisionResult<Self> {
        config.validate()?;
        Ok(Self { config, images })
    }

    /// Create an engine with the default configuration.
    pub fn with_defaults(images: Arc<dyn ImageSource>) -> Self {
        Self {
            config: EngineConfig::default(),
            images,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn selector(&self) -> MatchSelector {
        if self.config.parallel {
            MatchSelector::parallel()
        } else {
            MatchSelector::sequential()
        }
    }

    /// Decode encoded bytes and extract features.
    pub fn extract_bytes(&self, bytes: &[u8], strategy: Strategy) -> VisionResult<FeatureSet> {
        let image = decode_image(bytes)?;
        extract(&image, strategy, &self.config)
    }

    /// Fetch, decode and extract the image of one catalog entry.
    pub fn extract_entry(
        &self,
        entry: &ReferenceEntry,
        strategy: Strategy,
    ) -> VisionResult<FeatureSet> {
        let image = self.images.fetch(&entry.image_source)?.decode()?;
        extract(&image, strategy, &self.config)
    }

    /// Score the query image against every catalog entry in one pass.
    ///
    /// A query that cannot be decoded or yields no features fails the whole
    /// request before any catalog entry is touched. Failures on individual
    /// catalog entries only skip that entry.
    pub fn scan(
        &self,
        query_bytes: &[u8],
        catalog: &[ReferenceEntry],
        strategy: Strategy,
    ) -> VisionResult<ScanReport> {
        let query = self.extract_bytes(query_bytes, strategy)?;
        tracing::debug!(
            "Query features: {} {} elements; scanning {} entries",
            query.len(),
            strategy,
            catalog.len()
        );

        self.selector().score_all(
            &query,
            catalog,
            |entry| self.extract_entry(entry, strategy),
            score,
        )
    }

    /// Find the catalog entry most similar to the query image.
    pub fn find_best_match(
        &self,
        query_bytes: &[u8],
        catalog: &[ReferenceEntry],
        strategy: Strategy,
    ) -> VisionResult<MatchResult> {
        Ok(self.scan(query_bytes, catalog, strategy)?.best_match())
    }

    /// Top `k` catalog entries by similarity to the query image.
    pub fn rank(
        &self,
        query_bytes: &[u8],
        catalog: &[ReferenceEntry],
        strategy: Strategy,
        k: usize,
    ) -> VisionResult<Vec<MatchCandidate>> {
        Ok(self.scan(query_bytes, catalog, strategy)?.top(k))
    }

    /// Similarity between two encoded images. Both must decode and yield features.
    pub fn compare(&self, a: &[u8], b: &[u8], strategy: Strategy) -> VisionResult<f32> {
        let fa = self.extract_bytes(a, strategy)?;
        let fb = self.extract_bytes(b, strategy)?;
        score(&fa, &fb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FetchedImage, MemoryImageSource};
    use crate::types::{Label, VisionError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use image::{DynamicImage, Rgb, RgbImage};

    fn png(img: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        DynamicImage::ImageRgb8(img).write_with_encoder(encoder).unwrap();
        buf
    }

    fn solid(color: [u8; 3]) -> Vec<u8> {
        png(RgbImage::from_pixel(64, 64, Rgb(color)))
    }

    fn entry(brand: &str, source: &str) -> ReferenceEntry {
        ReferenceEntry::new(Label::new(brand, "Coupe"), source)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.keypoint.max_keypoints = 0;
        assert!(MatchingEngine::new(config, Arc::new(MemoryImageSource::new())).is_err());
    }

    #[test]
    fn test_red_query_matches_red_reference() {
        let images = MemoryImageSource::new()
            .with("red", solid([255, 0, 0]))
            .with("blue", solid([0, 0, 255]));
        let engine = MatchingEngine::with_defaults(Arc::new(images));
        let catalog = vec![entry("A", "red"), entry("B", "blue")];

        let result = engine
            .find_best_match(&solid([255, 0, 0]), &catalog, Strategy::Histogram)
            .unwrap();
        assert!(result.found);
        assert_eq!(result.label.unwrap().brand, "A");
        assert!((result.similarity_score - 1.0).abs() < 1e-4);
    }

    /// Counts fetches so tests can tell whether the catalog was touched.
    struct CountingSource {
        inner: MemoryImageSource,
        fetches: AtomicUsize,
    }

    impl CountingSource {
        fn new(inner: MemoryImageSource) -> Arc<Self> {
            Arc::new(Self {
                inner,
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ImageSource for CountingSource {
        fn fetch(&self, id: &str) -> VisionResult<FetchedImage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(id)
        }
    }

    #[test]
    fn test_corrupt_query_fails_before_scan() {
        let source = CountingSource::new(
            MemoryImageSource::new()
                .with("red", solid([255, 0, 0]))
                .with("blue", solid([0, 0, 255])),
        );
        let engine = MatchingEngine::with_defaults(source.clone());
        let catalog = vec![entry("A", "red"), entry("B", "blue")];

        for strategy in Strategy::ALL {
            let err = engine
                .find_best_match(b"\x89PNG garbage", &catalog, strategy)
                .unwrap_err();
            assert!(matches!(err, VisionError::Decode(_)));
        }
        let err = engine
            .rank(b"not an image", &catalog, Strategy::Histogram, 3)
            .unwrap_err();
        assert!(matches!(err, VisionError::Decode(_)));
        assert_eq!(source.fetches(), 0);

        engine
            .find_best_match(&solid([255, 0, 0]), &catalog, Strategy::Histogram)
            .unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[test]
    fn test_flat_query_fails_before_scan() {
        let source = CountingSource::new(MemoryImageSource::new().with("red", solid([255, 0, 0])));
        let engine = MatchingEngine::with_defaults(source.clone());

        let err = engine
            .find_best_match(&solid([40, 40, 40]), &[entry("A", "red")], Strategy::Keypoint)
            .unwrap_err();
        assert!(matches!(err, VisionError::Extraction(_)));
        assert_eq!(source.fetches(), 0);
    }

    #[test]
    fn test_scan_fetches_each_entry_once() {
        let source = CountingSource::new(
            MemoryImageSource::new()
                .with("red", solid([250, 5, 5]))
                .with("blue", solid([0, 0, 255])),
        );
        let engine = MatchingEngine::with_defaults(source.clone());
        let catalog = vec![entry("Blue", "blue"), entry("Red", "red"), entry("Gone", "missing")];

        let report = engine
            .scan(&solid([255, 0, 0]), &catalog, Strategy::Histogram)
            .unwrap();
        assert_eq!(source.fetches(), 3);

        let best = report.best_match();
        let top = report.top(5);
        assert_eq!(best.label.unwrap().brand, "Red");
        assert_eq!(best.skipped, 1);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].label.brand, "Red");
        assert_eq!(source.fetches(), 3);
    }

    #[test]
    fn test_compare_identical_images() {
        let engine = MatchingEngine::with_defaults(Arc::new(MemoryImageSource::new()));
        let img = png(RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        }));

        for strategy in [Strategy::Histogram, Strategy::Template] {
            let s = engine.compare(&img, &img, strategy).unwrap();
            assert!((s - 1.0).abs() < 1e-4, "{strategy}: {s}");
        }
    }

    #[test]
    fn test_rank_orders_by_score() {
        let images = MemoryImageSource::new()
            .with("red", solid([250, 5, 5]))
            .with("blue", solid([0, 0, 255]));
        let engine = MatchingEngine::with_defaults(Arc::new(images));
        let catalog = vec![entry("Blue", "blue"), entry("Red", "red"), entry("Gone", "missing")];

        let ranked = engine
            .rank(&solid([255, 0, 0]), &catalog, Strategy::Histogram, 5)
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].label.brand, "Red");
    }
}
