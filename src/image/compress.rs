//! Downscaling and JPEG re-encoding of generated images before they are
//! stored in history.

use crate::error::{Result, WarrickError};
use crate::image::types::{ImageFormat, ImagePayload};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::time::Duration;

/// Default maximum width of stored images, in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 600;
/// Default JPEG quality (1-100).
pub const DEFAULT_QUALITY: u8 = 80;
/// Default bound on decode + re-encode.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Target constraints for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Output is never wider than this.
    pub max_width: u32,
    /// JPEG quality, clamped to 1-100.
    pub quality: u8,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Computes output dimensions: never upscales, keeps the aspect ratio.
fn target_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scale = max_width as f64 / width as f64;
    let scaled_height = ((height as f64) * scale).round().max(1.0) as u32;
    (max_width, scaled_height)
}

/// Decodes, downscales and re-encodes `payload` as JPEG on the current thread.
pub fn compress_blocking(payload: &ImagePayload, options: CompressOptions) -> Result<ImagePayload> {
    let decoded = image::load_from_memory(&payload.data)
        .map_err(|e| WarrickError::Decode(format!("cannot decode image: {e}")))?;

    let max_width = options.max_width.max(1);
    let (width, height) = target_size(decoded.width(), decoded.height(), max_width);
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, options.quality.clamp(1, 100));
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| WarrickError::Decode(format!("cannot encode JPEG: {e}")))?;
    }

    tracing::debug!(
        from_bytes = payload.size(),
        to_bytes = out.len(),
        width,
        height,
        "compressed image"
    );
    Ok(ImagePayload::new(out, ImageFormat::Jpeg))
}

/// Compresses `payload` on the blocking pool, giving up after `timeout`.
///
/// Decode failures surface as [`WarrickError::Decode`]; an overrun surfaces
/// as [`WarrickError::Timeout`].
pub async fn compress(
    payload: &ImagePayload,
    options: CompressOptions,
    timeout: Duration,
) -> Result<ImagePayload> {
    let payload = payload.clone();
    let task = tokio::task::spawn_blocking(move || compress_blocking(&payload, options));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(WarrickError::Decode(format!(
            "compression task failed: {join_err}"
        ))),
        Err(_) => Err(WarrickError::Timeout(timeout)),
    }
}
