//! An out-of-the-box philosophical dialogue stage backed by Ollama.
//!
//! The crate includes a CLI tool for watching dialogues in the
//! terminal. And you can also use it as a library to bring dialogue
//! orchestration into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod stage;

pub use stage::{Stage, StageBuilder};

/// Re-exports of [`parley_core`] crate.
pub mod core {
    pub use parley_core::*;
}
