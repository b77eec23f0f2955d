//! Domain model for scenes.

pub mod scene;
