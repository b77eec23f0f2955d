//! Domain model for fork pages.

pub mod page;
