//! Application layer: the scene collection and its bulk operations.

pub mod collection;
