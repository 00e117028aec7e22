//! Image generation: request types, the provider seam, and compression.

pub mod compress;
mod provider;
pub mod providers;
mod types;

pub use compress::{compress, compress_blocking, CompressOptions};
pub use provider::ImageProvider;
pub use types::{
    AspectRatio, GeminiModel, GenerationMode, GenerationRequest, ImageFormat, ImagePayload,
};
