// src/services/image_processor.rs
use crate::models::ImagePayload;
use base64::{Engine as _, engine::general_purpose};
use image::{ColorType, DynamicImage, GenericImageView, RgbImage, codecs::jpeg::JpegEncoder};
use log::{debug, warn};
use std::time::Duration;

pub const MAX_WIDTH: u32 = 1024;
pub const JPEG_QUALITY: u8 = 70;
pub const COMPRESSION_TIMEOUT: Duration = Duration::from_secs(4);

/// Best-effort downsizing of uploaded images before they are sent to a
/// vision model. Never fails: any problem yields the original payload.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    timeout: Duration,
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            timeout: COMPRESSION_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn compress(&self, payload: &ImagePayload) -> ImagePayload {
        let source = payload.clone();
        let work = tokio::task::spawn_blocking(move || compress_data_uri(source.as_str()));

        match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(Ok(compressed))) => compressed,
            Ok(Ok(Err(reason))) => {
                warn!("Compression failed, sending original: {}", reason);
                payload.clone()
            }
            Ok(Err(join_err)) => {
                warn!("Compression task aborted, sending original: {}", join_err);
                payload.clone()
            }
            Err(_) => {
                warn!(
                    "Compression timed out after {:?}, sending original",
                    self.timeout
                );
                payload.clone()
            }
        }
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Target size for an image of the given dimensions. Only the width is bounded.
pub fn target_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width <= MAX_WIDTH {
        return (width, height);
    }
    let scaled = (height as f64 * MAX_WIDTH as f64 / width as f64).round() as u32;
    (MAX_WIDTH, scaled.max(1))
}

fn compress_data_uri(encoded: &str) -> Result<ImagePayload, String> {
    let data = decode_data_uri(encoded)?;
    let img = image::load_from_memory(&data).map_err(|e| format!("Failed to load image: {}", e))?;

    let (width, height) = img.dimensions();
    let (new_width, new_height) = target_dimensions(width, height);
    let resized = if (new_width, new_height) != (width, height) {
        img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let flattened = flatten_onto_white(&resized);
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY)
        .encode(
            flattened.as_raw(),
            flattened.width(),
            flattened.height(),
            ColorType::Rgb8,
        )
        .map_err(|e| format!("Failed to encode compressed image: {}", e))?;

    let compressed = ImagePayload::from_bytes("image/jpeg", &output);
    // Re-encoding an already small image can grow it; keep the original then.
    // The original keeps its own format, so any transparency is left as-is.
    if (new_width, new_height) == (width, height) && compressed.0.len() >= encoded.len() {
        debug!("Re-encoded image is not smaller, keeping original");
        return Ok(ImagePayload::new(encoded));
    }

    debug!(
        "Compressed image {}x{} -> {}x{} ({} -> {} bytes)",
        width,
        height,
        new_width,
        new_height,
        encoded.len(),
        compressed.0.len()
    );
    Ok(compressed)
}

fn decode_data_uri(encoded: &str) -> Result<Vec<u8>, String> {
    let rest = encoded
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| "payload is not a data URI".to_string())?;
    let (meta, body) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no payload".to_string())?;
    if !meta.ends_with(";base64") {
        return Err("data URI is not base64 encoded".to_string());
    }
    general_purpose::STANDARD
        .decode(body.trim())
        .map_err(|e| format!("Invalid base64 payload: {}", e))
}

/// JPEG has no alpha channel, so transparent pixels are blended onto white.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_payload(width: u32, height: u32, alpha: u8) -> ImagePayload {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8, alpha])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        ImagePayload::from_bytes("image/png", &bytes)
    }

    fn decoded_dimensions(payload: &ImagePayload) -> (u32, u32) {
        let data = decode_data_uri(payload.as_str()).unwrap();
        image::load_from_memory(&data).unwrap().dimensions()
    }

    #[test]
    fn narrow_images_are_not_upscaled() {
        assert_eq!(target_dimensions(640, 360), (640, 360));
        assert_eq!(target_dimensions(1024, 4000), (1024, 4000));
    }

    #[test]
    fn wide_images_keep_aspect_ratio() {
        assert_eq!(target_dimensions(2048, 1152), (1024, 576));
        assert_eq!(target_dimensions(1280, 720), (1024, 576));
        // 1000 * 1024 / 3000 = 341.33
        assert_eq!(target_dimensions(3000, 1000), (1024, 341));
    }

    #[tokio::test]
    async fn wide_png_becomes_bounded_jpeg() {
        let payload = png_payload(2048, 1152, 255);
        let compressed = ImageProcessor::new().compress(&payload).await;

        assert!(compressed.as_str().starts_with("data:image/jpeg;base64,"));
        assert_eq!(decoded_dimensions(&compressed), (1024, 576));
    }

    #[tokio::test]
    async fn small_images_keep_their_dimensions() {
        let payload = png_payload(300, 200, 255);
        let compressed = ImageProcessor::new().compress(&payload).await;
        assert_eq!(decoded_dimensions(&compressed), (300, 200));
    }

    #[tokio::test]
    async fn undecodable_payload_is_returned_unchanged() {
        let processor = ImageProcessor::new();

        let garbage = ImagePayload::new("data:image/png;base64,bm90IGFuIGltYWdl");
        assert_eq!(processor.compress(&garbage).await, garbage);

        let remote = ImagePayload::new("https://example.com/thumb.png");
        assert_eq!(processor.compress(&remote).await, remote);
    }

    #[tokio::test]
    async fn stalled_compression_returns_original() {
        let payload = png_payload(2048, 1152, 255);
        let processor = ImageProcessor::with_timeout(Duration::ZERO);
        assert_eq!(processor.compress(&payload).await, payload);
    }

    #[tokio::test]
    async fn transparent_upload_becomes_white_jpeg() {
        let img = RgbaImage::from_pixel(1200, 100, Rgba([0, 0, 0, 0]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        let payload = ImagePayload::from_bytes("image/png", &bytes);

        let compressed = ImageProcessor::new().compress(&payload).await;
        assert!(compressed.as_str().starts_with("data:image/jpeg;base64,"));

        let decoded = image::load_from_memory(&decode_data_uri(compressed.as_str()).unwrap())
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.dimensions(), (1024, 85));
        let [r, g, b] = decoded.get_pixel(512, 42).0;
        assert!(r >= 250 && g >= 250 && b >= 250, "expected white, got {r},{g},{b}");
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flat = flatten_onto_white(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255])));
        assert_eq!(flatten_onto_white(&opaque).get_pixel(0, 0).0, [10, 20, 30]);
    }
}
