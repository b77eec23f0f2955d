//! Pipeline commands.

pub mod commands;
