//! Catalog and image-source collaborators.
//!
//! The engine never touches the network. Catalogs are read from JSON files and
//! images from the local filesystem or inline `data:` URIs; other transports
//! plug in by implementing [`ImageSource`] / [`CatalogSource`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use image::RgbImage;
use serde::Deserialize;

use crate::decode::{decode_image, decode_image_with_mime};
use crate::types::{Label, ReferenceEntry, VisionError, VisionResult};

/// Raw encoded image bytes with an optional MIME hint.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl FetchedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, mime: None }
    }

    /// Decode using the MIME hint when one is known.
    pub fn decode(&self) -> VisionResult<RgbImage> {
        match self.mime.as_deref() {
            Some(mime) => decode_image_with_mime(&self.bytes, mime),
            None => decode_image(&self.bytes),
        }
    }
}

/// Resolves a catalog entry's image identifier to encoded bytes.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, id: &str) -> VisionResult<FetchedImage>;
}

/// Supplies the ordered list of reference entries. Order decides ties.
pub trait CatalogSource {
    fn entries(&self) -> VisionResult<Vec<ReferenceEntry>>;
}

/// Reads images from disk, resolving relative paths against `root`.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an identifier to a filesystem path.
    pub fn resolve(&self, id: &str) -> PathBuf {
        let trimmed = id.trim();
        let raw = trimmed.strip_prefix("file://").unwrap_or(trimmed);
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ImageSource for FsImageSource {
    fn fetch(&self, id: &str) -> VisionResult<FetchedImage> {
        let id = id.trim();
        if id.starts_with("data:") {
            return parse_data_uri(id);
        }
        if id.starts_with("http://") || id.starts_with("https://") {
            return Err(VisionError::ImageSource(format!(
                "network image sources are not supported: {id}"
            )));
        }

        let path = self.resolve(id);
        let bytes = std::fs::read(&path)
            .map_err(|e| VisionError::ImageSource(format!("{}: {e}", path.display())))?;
        Ok(FetchedImage::new(bytes))
    }
}

/// In-memory images keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<String, Vec<u8>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, bytes: Vec<u8>) {
        self.images.insert(id.into(), bytes);
    }

    pub fn with(mut self, id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(id, bytes);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn fetch(&self, id: &str) -> VisionResult<FetchedImage> {
        if id.starts_with("data:") {
            return parse_data_uri(id);
        }
        self.images
            .get(id)
            .map(|bytes| FetchedImage::new(bytes.clone()))
            .ok_or_else(|| VisionError::ImageSource(format!("unknown image: {id}")))
    }
}

/// Decode a `data:<mime>;base64,<payload>` URI.
pub fn parse_data_uri(uri: &str) -> VisionResult<FetchedImage> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| VisionError::ImageSource("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| VisionError::ImageSource("data URI has no payload".to_string()))?;
    let mime = header.strip_suffix(";base64").ok_or_else(|| {
        VisionError::ImageSource("only base64 data URIs are supported".to_string())
    })?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| VisionError::ImageSource(format!("Invalid base64: {e}")))?;

    Ok(FetchedImage {
        bytes,
        mime: (!mime.is_empty()).then(|| mime.to_string()),
    })
}

/// A catalog stored as a JSON file.
///
/// Two layouts are accepted:
/// - an array of records: `[{"brand": .., "type": .., "image": ..}]`
///   (spreadsheet-style `Brand` / `Type` / `Image URL` keys also work);
/// - an array of rows with a header row first: `[["image", "brand", "type"], [..]]`.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory relative image paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Parse catalog JSON text.
    pub fn parse(raw: &str) -> VisionResult<Vec<ReferenceEntry>> {
        let parsed: RawCatalog = serde_json::from_str(raw)?;
        let records = match parsed {
            RawCatalog::Records(records) => records,
            RawCatalog::Rows(rows) => rows
                .into_iter()
                .skip(1)
                .enumerate()
                .map(|(i, row)| match <[String; 3]>::try_from(row) {
                    Ok([image, brand, kind]) => Ok(CatalogRecord { brand, kind, image }),
                    Err(row) => Err(VisionError::Catalog(format!(
                        "row {} has {} cells, expected image, brand, type",
                        i + 1,
                        row.len()
                    ))),
                })
                .collect::<VisionResult<Vec<_>>>()?,
        };

        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| record.into_entry(i))
            .collect()
    }
}

impl CatalogSource for JsonCatalog {
    fn entries(&self) -> VisionResult<Vec<ReferenceEntry>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            VisionError::Catalog(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let entries = Self::parse(&raw)?;
        tracing::info!(
            "Loaded {} catalog entries from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCatalog {
    Records(Vec<CatalogRecord>),
    Rows(Vec<Vec<String>>),
}

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    #[serde(alias = "Brand")]
    brand: String,
    #[serde(rename = "type", alias = "Type")]
    kind: String,
    #[serde(alias = "Image URL", alias = "image_url", alias = "url")]
    image: String,
}

impl CatalogRecord {
    fn into_entry(self, index: usize) -> VisionResult<ReferenceEntry> {
        let brand = self.brand.trim();
        let kind = self.kind.trim();
        let image = self.image.trim();
        if image.is_empty() {
            return Err(VisionError::Catalog(format!("entry {index} has no image")));
        }
        if brand.is_empty() && kind.is_empty() {
            return Err(VisionError::Catalog(format!("entry {index} has no label")));
        }
        Ok(ReferenceEntry::new(Label::new(brand, kind), image))
    }
}
