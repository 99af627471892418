//! Image decoding and normalization.

use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};

use crate::types::{VisionError, VisionResult};

/// Longest side kept after decoding. Larger images are downsized, aspect preserved.
pub const MAX_DECODE_DIMENSION: u32 = 2048;

/// Decode raw encoded bytes, guessing the container format.
pub fn decode_image(bytes: &[u8]) -> VisionResult<RgbImage> {
    let img = image::load_from_memory(bytes)?;
    normalize(img)
}

/// Decode raw bytes with a MIME hint. Unknown MIME types fall back to format guessing.
pub fn decode_image_with_mime(bytes: &[u8], mime: &str) -> VisionResult<RgbImage> {
    let format = match mime {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        "image/bmp" => Some(ImageFormat::Bmp),
        _ => None,
    };

    let img = if let Some(fmt) = format {
        image::load_from_memory_with_format(bytes, fmt)?
    } else {
        image::load_from_memory(bytes)?
    };
    normalize(img)
}

/// Convert to 8-bit RGB and bound the resolution.
fn normalize(img: DynamicImage) -> VisionResult<RgbImage> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(VisionError::EmptyImage);
    }

    let img = if w > MAX_DECODE_DIMENSION || h > MAX_DECODE_DIMENSION {
        tracing::debug!("Downsizing {w}x{h} image to fit {MAX_DECODE_DIMENSION}px");
        img.resize(
            MAX_DECODE_DIMENSION,
            MAX_DECODE_DIMENSION,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        img.write_with_encoder(encoder).unwrap();
        buf
    }

    #[test]
    fn test_decode_png() {
        let png = encode_png(&DynamicImage::new_rgb8(40, 30));
        let img = decode_image(&png).unwrap();
        assert_eq!(img.dimensions(), (40, 30));
    }

    #[test]
    fn test_decode_grayscale_becomes_rgb() {
        let png = encode_png(&DynamicImage::new_luma8(16, 16));
        let img = decode_image(&png).unwrap();
        assert_eq!(img.as_raw().len(), 16 * 16 * 3);
    }

    #[test]
    fn test_decode_large_image_is_bounded() {
        let png = encode_png(&DynamicImage::new_rgb8(MAX_DECODE_DIMENSION * 2, 100));
        let img = decode_image(&png).unwrap();
        assert!(img.width() <= MAX_DECODE_DIMENSION);
        assert!(img.height() <= MAX_DECODE_DIMENSION);
    }

    #[test]
    fn test_decode_corrupt_bytes() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, VisionError::Decode(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_with_wrong_mime_fails() {
        let png = encode_png(&DynamicImage::new_rgb8(8, 8));
        assert!(decode_image_with_mime(&png, "image/jpeg").is_err());
        assert!(decode_image_with_mime(&png, "application/octet-stream").is_ok());
    }
}
