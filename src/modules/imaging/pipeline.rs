use std::io::Cursor;

use base64::prelude::*;
use image::codecs::jpeg::JpegEncoder;

use crate::core::error::{AppError, Result};

/// A decoded, resized and re-encoded catalog image ready for storage
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Whether a submitted picture value is an already-hosted URL
/// rather than an embedded payload
pub fn is_remote_url(value: &str) -> bool {
    value.starts_with("http")
}

/// Decode a `data:<mime>;base64,<payload>` string, scale the image to fit
/// within `max_bound` × `max_bound` preserving aspect ratio, and re-encode
/// as JPEG.
///
/// A payload without a `data:` header is treated as bare base64, matching
/// the permissive split-at-first-comma parsing of the storefront clients.
pub fn process_data_uri(payload: &str, max_bound: u32, jpeg_quality: u8) -> Result<ProcessedImage> {
    let encoded = payload
        .split_once(',')
        .map(|(_, body)| body)
        .unwrap_or(payload);

    let raw = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid base64 image payload: {}", e)))?;

    let decoded = image::load_from_memory(&raw)
        .map_err(|e| AppError::BadRequest(format!("Unsupported or corrupt image: {}", e)))?;

    // Scales in both directions, like the storefront's fit-inside resize
    let resized = decoded.resize(max_bound, max_bound, image::imageops::FilterType::Lanczos3);

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();

    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| AppError::Internal(format!("Failed to encode image: {}", e)))?;

    Ok(ProcessedImage {
        bytes: out.into_inner(),
        content_type: "image/jpeg",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_data_uri(width: u32, height: u32) -> String {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 40, 200]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            BASE64_STANDARD.encode(buf.into_inner())
        )
    }

    #[test]
    fn shrinks_oversized_image_to_fit_bound() {
        let processed = process_data_uri(&png_data_uri(10, 6), 4, 85).unwrap();
        assert_eq!(processed.content_type, "image/jpeg");

        let out = image::load_from_memory(&processed.bytes).unwrap();
        assert!(out.width() <= 4 && out.height() <= 4);
        assert_eq!(out.width(), 4); // aspect ratio kept, widest side hits the bound
    }

    #[test]
    fn scales_small_image_up_to_bound() {
        let processed = process_data_uri(&png_data_uri(2, 2), 8, 85).unwrap();
        let out = image::load_from_memory(&processed.bytes).unwrap();
        assert_eq!((out.width(), out.height()), (8, 8));
    }

    #[test]
    fn output_is_jpeg() {
        let processed = process_data_uri(&png_data_uri(3, 3), 16, 85).unwrap();
        assert_eq!(
            image::guess_format(&processed.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn accepts_bare_base64_without_header() {
        let uri = png_data_uri(3, 3);
        let bare = uri.split_once(',').unwrap().1;
        assert!(process_data_uri(bare, 16, 85).is_ok());
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = process_data_uri("data:image/png;base64,@@not-base64@@", 16, 85).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_non_image_payload() {
        let uri = format!(
            "data:text/plain;base64,{}",
            BASE64_STANDARD.encode(b"hello world")
        );
        let err = process_data_uri(&uri, 16, 85).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn detects_remote_urls() {
        assert!(is_remote_url("http://cdn.example.com/a.jpg"));
        assert!(is_remote_url("https://cdn.example.com/a.jpg"));
        assert!(!is_remote_url("data:image/png;base64,AAAA"));
        assert!(!is_remote_url("/media/categories/category_1.jpg"));
    }
}
