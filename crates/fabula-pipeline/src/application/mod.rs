//! Application layer: the orchestrator.

pub mod orchestrator;
