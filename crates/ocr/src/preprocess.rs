use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use thiserror::Error;

/// Longest edge handed to the recognizer; Tesseract does best around 300 DPI.
pub const DEFAULT_MAX_DIMENSION: u32 = 2800;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode image bytes (PNG / JPEG / WEBP / TIFF), normalize them for OCR and
/// return PNG bytes.
pub fn prepare_for_ocr(data: &[u8], max_dimension: u32) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    let gray = normalize(img, max_dimension);
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Downscale to `max_dimension`, convert to grayscale and stretch contrast so
/// the darkest pixel becomes 0 and the lightest 255.
fn normalize(img: DynamicImage, max_dimension: u32) -> GrayImage {
    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let mut gray = img.to_luma8();
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if hi <= lo {
        return gray;
    }

    let range = u32::from(hi - lo);
    for p in gray.pixels_mut() {
        p[0] = (u32::from(p[0] - lo) * 255 / range) as u8;
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};

    fn encode(img: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn uniform_image_is_left_alone() {
        let img: GrayImage = ImageBuffer::from_fn(10, 10, |_, _| Luma([128u8]));
        let out = normalize(DynamicImage::ImageLuma8(img), DEFAULT_MAX_DIMENSION);
        assert_eq!(out.dimensions(), (10, 10));
        assert!(out.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn low_contrast_scan_is_stretched() {
        // Faded receipt: everything between 100 and 150.
        let img: GrayImage = ImageBuffer::from_fn(51, 1, |x, _| Luma([100 + x as u8]));
        let out = normalize(DynamicImage::ImageLuma8(img), DEFAULT_MAX_DIMENSION);
        let min = out.pixels().map(|p| p[0]).min().unwrap();
        let max = out.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!((min, max), (0, 255));
    }

    #[test]
    fn oversized_photo_is_downscaled() {
        let img: GrayImage = ImageBuffer::from_fn(400, 100, |_, _| Luma([200u8]));
        let out = normalize(DynamicImage::ImageLuma8(img), 200);
        assert!(out.width() <= 200 && out.height() <= 200);
    }

    #[test]
    fn color_jpeg_becomes_grayscale_png() {
        let img: RgbImage = ImageBuffer::from_fn(8, 8, |x, _| Rgb([x as u8 * 30, 10, 10]));
        let jpeg = encode(DynamicImage::ImageRgb8(img), image::ImageFormat::Jpeg);
        let out = prepare_for_ocr(&jpeg, DEFAULT_MAX_DIMENSION).unwrap();
        assert_eq!(&out[..4], b"\x89PNG");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            prepare_for_ocr(b"definitely not an image", DEFAULT_MAX_DIMENSION),
            Err(PreprocessError::Decode(_))
        ));
    }
}
