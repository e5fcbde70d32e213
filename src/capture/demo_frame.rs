//! Synthetic frames for demo cameras

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageResult};

/// Diagonal gray gradient that scrolls every 100 ms, JPEG encoded
pub fn generate_demo_frame(width: u32, height: u32, quality: u8, now_ms: i64) -> ImageResult<Vec<u8>> {
    let shift = (now_ms / 100).rem_euclid(256) as u32;

    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(((x + y + shift) % 256) as u8);
        }
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
        &pixels,
        width,
        height,
        ExtendedColorType::L8,
    )?;
    Ok(out)
}
