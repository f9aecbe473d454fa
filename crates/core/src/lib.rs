//! Core logic of the dialogue system: persona catalog, prompt
//! composition, the per-conversation orchestration actor, viewer
//! fan-out, and the process-wide hub that ties them together.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod catalog;
pub mod conversation;
mod dialogue;
mod error;
pub mod events;
mod generation;
mod hub;
pub mod prompt;

pub use error::Error;
pub use generation::{CompletedGeneration, GenerationClient};
pub use hub::{DialogueHub, DialogueHubBuilder, HealthReport, HealthStatus};
