//! API key selection.
//!
//! Some hosts can let the user pick an API key interactively (for example a
//! paid key for the pro model). [`KeySelector`] is that optional capability;
//! [`Credentials`] is where a selected key lands so the provider can read it
//! at call time.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Environment variables consulted for the API key, in order.
pub const DEFAULT_KEY_ENV_VARS: [&str; 3] = ["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Shared, late-bound API key.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    selected: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    /// Creates an empty handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a key chosen through key selection. Blank keys clear it.
    pub fn select(&self, key: impl Into<String>) {
        let key = key.into();
        let key = key.trim();
        let mut selected = self.selected.write().unwrap_or_else(|e| e.into_inner());
        *selected = (!key.is_empty()).then(|| key.to_string());
    }

    /// Forgets the selected key.
    pub fn clear(&self) {
        let mut selected = self.selected.write().unwrap_or_else(|e| e.into_inner());
        *selected = None;
    }

    /// Returns true if a key has been selected.
    pub fn has_selected(&self) -> bool {
        self.selected().is_some()
    }

    /// Returns the selected key, if any.
    pub fn selected(&self) -> Option<String> {
        self.selected
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Looks up the first non-empty variable among `names`.
pub(crate) fn key_from_env(names: &[String]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Host capability for interactive API key selection.
#[async_trait]
pub trait KeySelector: Send + Sync {
    /// Returns true if the user already selected a key.
    async fn has_selected_api_key(&self) -> bool;

    /// Lets the user pick a key and waits until they have.
    async fn open_select_key(&self) -> Result<()>;
}
