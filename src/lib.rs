#![warn(missing_docs)]
//! Warrick - prompt-to-image generation with a local history cache.
//!
//! A [`GenerationController`] owns the prompt form, a capped newest-first
//! [`HistoryStore`], and the current selection. Each call to
//! [`GenerationController::generate`] validates the prompt, asks an
//! [`ImageProvider`] (normally [`GeminiProvider`]) for an image, downsizes it,
//! and stores it as a self-contained data URL.
//!
//! # Quick Start
//!
//! ```no_run
//! use warrick::{
//!     ControllerConfig, CycleOutcome, FileStorage, GeminiProvider, GenerationController,
//!     HistoryStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> warrick::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let history = HistoryStore::load(FileStorage::from_env());
//!     let controller = GenerationController::new(provider, history, ControllerConfig::from_env());
//!
//!     controller.set_prompt("A lighthouse on a glass cliff at dawn");
//!     if let CycleOutcome::Committed(entry) = controller.generate().await? {
//!         entry.payload()?.save("lighthouse.jpg")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `warrick` command-line front-end.

mod config;
pub mod controller;
mod error;
pub mod history;
pub mod image;
pub mod keys;

pub use config::{ControllerConfig, JPEG_QUALITY_ENV, MAX_WIDTH_ENV};
pub use controller::{CycleOutcome, GenerationController, Phase, Snapshot};
pub use error::{ErrorKind, Result, WarrickError};
pub use history::{FileStorage, GeneratedImage, HistoryStorage, HistoryStore, MemoryStorage};
pub use image::providers::{GeminiProvider, GeminiProviderBuilder};
pub use image::{
    AspectRatio, CompressOptions, GeminiModel, GenerationMode, GenerationRequest, ImageFormat,
    ImagePayload, ImageProvider,
};
pub use keys::{Credentials, KeySelector};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::controller::{CycleOutcome, GenerationController};
    pub use crate::error::{Result, WarrickError};
    pub use crate::history::{FileStorage, GeneratedImage, HistoryStore};
    pub use crate::image::providers::GeminiProvider;
    pub use crate::image::{AspectRatio, GenerationMode, ImageProvider};
}
