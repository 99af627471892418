//! Core data types for catalog entries, match results, and errors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category label attached to every reference image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub brand: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Label {
    pub fn new(brand: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.brand, self.kind)
    }
}

/// One labelled reference image in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub label: Label,
    /// Identifier handed to the [`ImageSource`](crate::catalog::ImageSource): a path,
    /// a `file://` URL or a `data:` URI.
    pub image_source: String,
}

impl ReferenceEntry {
    pub fn new(label: Label, image_source: impl Into<String>) -> Self {
        Self {
            label,
            image_source: image_source.into(),
        }
    }
}

/// A scored catalog entry produced during selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Position of the entry in the catalog. Lower wins ties.
    pub index: usize,
    pub label: Label,
    pub similarity_score: f32,
}

impl MatchCandidate {
    /// Whether `self` should replace `other` as the running best:
    /// strictly greater score, or equal score from an earlier catalog position.
    pub fn beats(&self, other: &MatchCandidate) -> bool {
        self.similarity_score > other.similarity_score
            || (self.similarity_score == other.similarity_score && self.index < other.index)
    }
}

/// Final answer for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(flatten)]
    pub label: Option<Label>,
    pub similarity_score: f32,
    pub found: bool,
    /// Catalog entries examined.
    pub scanned: usize,
    /// Entries dropped because their image could not be fetched, decoded or described.
    pub skipped: usize,
}

impl MatchResult {
    /// A result with no usable candidate.
    pub fn not_found(scanned: usize, skipped: usize) -> Self {
        Self {
            label: None,
            similarity_score: 0.0,
            found: false,
            scanned,
            skipped,
        }
    }

    /// A result carrying the winning candidate.
    pub fn from_candidate(best: MatchCandidate, scanned: usize, skipped: usize) -> Self {
        Self {
            label: Some(best.label),
            similarity_score: best.similarity_score,
            found: true,
            scanned,
            skipped,
        }
    }
}

/// Matching strategy: a closed pair of extractor and scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// ORB-style keypoints matched by cross-checked Hamming distance.
    Keypoint,
    /// Joint RGB histogram compared by Pearson correlation.
    #[default]
    Histogram,
    /// Canonical grayscale image compared by normalized cross-correlation.
    Template,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Keypoint, Strategy::Histogram, Strategy::Template];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Keypoint => "keypoint",
            Strategy::Histogram => "histogram",
            Strategy::Template => "template",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keypoint" | "keypoints" | "orb" => Ok(Strategy::Keypoint),
            "histogram" | "hist" | "color" => Ok(Strategy::Histogram),
            "template" | "ccoeff" => Ok(Strategy::Template),
            other => Err(format!(
                "unknown strategy '{other}' (expected keypoint, histogram or template)"
            )),
        }
    }
}

/// Errors that can occur in the matching engine.
#[derive(thiserror::Error, Debug)]
pub enum VisionError {
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Decode error: image has zero area")]
    EmptyImage,

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Incompatible features: cannot compare {left} features with {right} features")]
    IncompatibleFeatures { left: Strategy, right: Strategy },

    #[error("Image source error: {0}")]
    ImageSource(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisionError {
    /// Per-entry failures that the selector logs and skips instead of aborting the scan.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VisionError::Decode(_)
                | VisionError::EmptyImage
                | VisionError::Extraction(_)
                | VisionError::ImageSource(_)
                | VisionError::Io(_)
        )
    }
}

/// Convenience result type.
pub type VisionResult<T> = Result<T, VisionError>;
