//! Fabula Pipeline — the per-board generation orchestrator.
//!
//! One orchestrator exclusively owns one board and its scene collection,
//! sequences the external generation calls each stage needs, and exposes
//! the resulting state to the presentation layer as an explicit
//! command → new-state-or-error API.

pub mod application;
pub mod domain;

pub use application::orchestrator::{Orchestrator, PipelineError};
