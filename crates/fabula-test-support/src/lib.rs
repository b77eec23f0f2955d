//! Shared test fakes for the Fabula storyboard pipeline.

mod client;
mod clock;

pub use client::{ApiCall, FailingApiClient, ScriptedApiClient};
pub use clock::FixedClock;
