//! Visual similarity matching: identify a car's brand and type by finding the
//! most similar image in a labelled reference catalog.
//!
//! ```no_run
//! use std::sync::Arc;
//! use carmatch::{CatalogSource, FsImageSource, JsonCatalog, MatchingEngine, Strategy};
//!
//! let catalog = JsonCatalog::new("catalog.json");
//! let entries = catalog.entries()?;
//! let engine = MatchingEngine::with_defaults(Arc::new(FsImageSource::new(catalog.base_dir())));
//! let query = std::fs::read("query.jpg")?;
//! let result = engine.find_best_match(&query, &entries, Strategy::Keypoint)?;
//! println!("{:?}", result.label);
//! # Ok::<(), carmatch::VisionError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod decode;
pub mod engine;
pub mod features;
pub mod selector;
pub mod similarity;
pub mod types;

pub use catalog::{
    parse_data_uri, CatalogSource, FetchedImage, FsImageSource, ImageSource, JsonCatalog,
    MemoryImageSource,
};
pub use config::{EngineConfig, HistogramConfig, KeypointConfig, TemplateConfig, MAX_CANONICAL_SIZE};
pub use decode::{decode_image, decode_image_with_mime, MAX_DECODE_DIMENSION};
pub use engine::MatchingEngine;
pub use features::{extract, FeatureSet};
pub use selector::{rank_candidates, MatchSelector, ScanReport};
pub use similarity::{cosine_similarity, pearson_correlation, score};
pub use types::*;
