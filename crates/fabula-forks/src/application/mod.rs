//! Application layer: the fork index and its fetch operations.

pub mod index;
