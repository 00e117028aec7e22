//! Controller configuration.

use crate::image::compress::{CompressOptions, DEFAULT_TIMEOUT};
use std::time::Duration;

/// Overrides the maximum stored image width.
pub const MAX_WIDTH_ENV: &str = "WARRICK_MAX_WIDTH";
/// Overrides the JPEG quality of stored images.
pub const JPEG_QUALITY_ENV: &str = "WARRICK_JPEG_QUALITY";

/// Tuning knobs for [`GenerationController`](crate::GenerationController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// How stored images are downscaled.
    pub compress: CompressOptions,
    /// Upper bound on decode + re-encode.
    pub compress_timeout: Duration,
    /// Cadence of the synthetic progress ticker.
    pub progress_tick: Duration,
    /// Pause between the terminal state and returning to idle.
    pub completion_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            compress: CompressOptions::default(),
            compress_timeout: DEFAULT_TIMEOUT,
            progress_tick: Duration::from_millis(100),
            completion_delay: Duration::from_millis(600),
        }
    }
}

impl ControllerConfig {
    /// Defaults, with `WARRICK_MAX_WIDTH` and `WARRICK_JPEG_QUALITY` applied
    /// when they parse.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(width) = parse_env::<u32>(MAX_WIDTH_ENV).filter(|w| *w > 0) {
            config.compress.max_width = width;
        }
        if let Some(quality) = parse_env::<u8>(JPEG_QUALITY_ENV) {
            config.compress.quality = quality.clamp(1, 100);
        }
        config
    }

    /// Sets the compression constraints.
    pub fn with_compress(mut self, compress: CompressOptions) -> Self {
        self.compress = compress;
        self
    }

    /// Sets the compression timeout.
    pub fn with_compress_timeout(mut self, timeout: Duration) -> Self {
        self.compress_timeout = timeout;
        self
    }

    /// Sets the progress tick interval. Ticks shorter than 1 ms run at 1 ms.
    pub fn with_progress_tick(mut self, tick: Duration) -> Self {
        self.progress_tick = tick;
        self
    }

    /// Sets the cosmetic completion delay.
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
