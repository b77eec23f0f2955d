//! Fabula Scenes — the scene collection manager.
//!
//! Each board owns an ordered list of scenes; a scene is meaningless
//! without its board. This crate manages that list: per-scene persistence
//! and image generation, bulk operations, and the contiguous-index
//! invariant the stage guards rely on.

pub mod application;
pub mod domain;
