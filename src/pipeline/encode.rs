//! Image encoding: `DynamicImage` → JPEG bytes → base64.
//!
//! ## Why JPEG here?
//!
//! Page images leave this crate as JSON strings for a language-model
//! collaborator. A 150 DPI page is several megabytes as PNG and a few hundred
//! kilobytes as JPEG at quality 85, with no visible loss on printed text.
//! OCR never goes through this path; it reads the raw render.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// JPEG-encode a rendered page. Alpha is dropped; JPEG has none.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    debug!("Encoded {}x{} page → {} bytes JPEG", rgb.width(), rgb.height(), buf.len());
    Ok(buf)
}

/// JPEG-encode and base64-wrap a rendered page for JSON transport.
pub fn encode_page_base64(img: &DynamicImage, quality: u8) -> Result<String, image::ImageError> {
    let jpeg = encode_jpeg(img, quality)?;
    Ok(to_base64(&jpeg))
}

/// Standard-alphabet, padded base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let jpeg = encode_jpeg(&img, 85).expect("encode should succeed");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "JPEG SOI marker");
    }

    #[test]
    fn base64_decodes_to_jpeg() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])));
        let b64 = encode_page_base64(&img, 85).expect("encode should succeed");
        let decoded = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(&decoded[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn lower_quality_is_not_larger() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255])
        }));
        let high = encode_jpeg(&img, 95).unwrap();
        let low = encode_jpeg(&img, 20).unwrap();
        assert!(low.len() <= high.len());
    }
}
