//! Observable controller state.

use crate::history::GeneratedImage;
use serde::Serialize;

/// Where the controller is in a generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Checking the prompt.
    Validating,
    /// Waiting on key selection or the provider.
    Requesting,
    /// Downscaling the returned image.
    Compressing,
    /// Result stored; about to return to idle.
    Committed,
    /// Cycle failed; about to return to idle.
    Failed,
}

impl Phase {
    /// Returns true while a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Requesting | Self::Compressing)
    }
}

/// What a UI needs to render the generation panel.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Snapshot {
    /// Current phase.
    pub phase: Phase,
    /// Synthetic progress, 0 to 100. Capped at 95 until a result is committed.
    pub progress: f32,
    /// Message of the last failure, cleared when the next cycle starts.
    pub error: Option<String>,
    /// Id of the selected history entry.
    pub current: Option<String>,
    /// Id of the cycle this snapshot belongs to.
    pub cycle: u64,
}

/// How a call to [`generate`](super::GenerationController::generate) ended,
/// short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new entry was stored and selected.
    Committed(GeneratedImage),
    /// The prompt was blank; nothing happened.
    EmptyPrompt,
    /// Another cycle is in flight; this one was not started.
    Busy,
    /// The cycle was abandoned before its result arrived; the result was dropped.
    Discarded,
}
