//! Commands accepted by the pipeline orchestrator.
//!
//! Every command carries a correlation id so one user action can be traced
//! through the remote calls it triggers.

use uuid::Uuid;

/// Advance the board out of its current stage, running that stage's side
/// effects first.
#[derive(Debug, Clone)]
pub struct NextStep {
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Free-form prompt steering story generation (used leaving `write`).
    pub prompt: String,
    /// Explicit user confirmation to advance past `draw` with scenes that
    /// have no generated image.
    pub override_missing_images: bool,
}

/// Move the board one stage backward for revision. No side effects;
/// generated data is retained.
#[derive(Debug, Clone)]
pub struct StepBack {
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
}

/// Publish the board. Terminal side-effecting action, not a stage change.
#[derive(Debug, Clone)]
pub struct PublishBoard {
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Explicit user confirmation to publish with imageless scenes.
    pub override_missing_images: bool,
}
