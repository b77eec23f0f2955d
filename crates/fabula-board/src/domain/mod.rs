//! Domain model for boards.

pub mod board;
pub mod stage;
