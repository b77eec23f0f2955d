//! Fabula Core — shared domain abstractions.
//!
//! This crate defines the identifier types, the error taxonomy, and the
//! remote-collaborator trait that every other crate depends on. It contains
//! no infrastructure code.

pub mod client;
pub mod clock;
pub mod error;
pub mod ids;
