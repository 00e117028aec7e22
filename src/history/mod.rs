//! Capped, newest-first history of generated images, persisted to a single
//! storage slot.

mod entry;
mod storage;
mod store;

pub use entry::GeneratedImage;
pub(crate) use entry::IdClock;
pub use storage::{FileStorage, HistoryStorage, MemoryStorage, HISTORY_PATH_ENV};
pub use store::{HistoryStore, MAX_HISTORY};
